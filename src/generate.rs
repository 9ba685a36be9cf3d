//! Generation entry points.
//!
//! Two modes, selected by whether a style reference image is configured:
//!
//! * **First slide only** (no style image): `copy` variants of the first
//!   renderable slide, letting the model choose a look. Used to explore a
//!   style before committing to a whole deck.
//! * **All slides** (style image): `copy` variants of every renderable
//!   slide passing the page filter, each request carrying the image as a
//!   strict style reference.
//!
//! Both modes validate the outline before any request is sent, then hand a
//! single [`Batch`] to the [`Dispatcher`] and the settled outcomes to the
//! materialiser.

use crate::batch::{Batch, GenerationRequest};
use crate::config::GeneratorConfig;
use crate::error::SlidegenError;
use crate::output::GenerationSummary;
use crate::pipeline::assemble::{DeckAssembler, PdfiumAssembler};
use crate::pipeline::backend::{ImageBackend, OpenRouterBackend};
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::outline::{parse_outline, Slide};
use crate::pipeline::{articles, materialize};
use crate::prompts::{build_outline_context, build_prompt, extract_global_style, StyleDirective};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Generate slide images for an outline.
///
/// Runs all-slides mode when [`GeneratorConfig::style_image`] is set and
/// first-slide mode otherwise.
///
/// # Returns
/// `Ok(GenerationSummary)` once every request has settled, even if some
/// failed (check `summary.report.failed`).
///
/// # Errors
/// Returns `Err(SlidegenError)` only for fatal errors:
/// - Outline without slides, or with nothing but the style section
/// - Page filter that selects no slide
/// - Unreadable style image or article
/// - Output directory not writable
pub async fn generate(
    outline: &str,
    config: &GeneratorConfig,
) -> Result<GenerationSummary, SlidegenError> {
    if config.style_image.is_some() {
        generate_all_slides(outline, config).await
    } else {
        generate_first_slide(outline, config).await
    }
}

/// Generate `copy` variants of the first renderable slide.
///
/// No reference image is sent. The page filter must include page 1.
pub async fn generate_first_slide(
    outline: &str,
    config: &GeneratorConfig,
) -> Result<GenerationSummary, SlidegenError> {
    let start = Instant::now();
    let (global_style, slides) = renderable_slides(outline)?;

    if !config.pages.contains(1) {
        return Err(SlidegenError::NoPagesMatched {
            pages: config.pages.pages().unwrap_or_default(),
        });
    }

    let slide = &slides[0];
    info!(
        "Parsed outline: 1 slide (first slide only). Title: {:?}",
        slide.title
    );
    info!(
        "Generating {} image(s) for slide {} (parallel, max {} concurrent)...",
        config.copy, slide.index, config.concurrency
    );

    let article_context = articles::load_articles(&config.articles).await?;
    let outline_context = build_outline_context(&slides);
    let style = StyleDirective::resolve(false, global_style.as_deref());

    let batch = Batch::for_slides(std::slice::from_ref(slide), config.copy, |s| {
        slide_request(s, &outline_context, style, None, article_context.as_deref())
    });

    run_batch(batch, config, start).await
}

/// Generate `copy` variants of every renderable slide in the page filter,
/// each styled after the configured reference image.
pub async fn generate_all_slides(
    outline: &str,
    config: &GeneratorConfig,
) -> Result<GenerationSummary, SlidegenError> {
    let start = Instant::now();
    let style_path = config.style_image.as_ref().ok_or_else(|| {
        SlidegenError::InvalidConfig("all-slides mode needs a style reference image".into())
    })?;

    let (global_style, slides) = renderable_slides(outline)?;
    let slides: Vec<Slide> = slides
        .into_iter()
        .filter(|s| config.pages.contains(s.index))
        .collect();
    if slides.is_empty() {
        return Err(SlidegenError::NoPagesMatched {
            pages: config.pages.pages().unwrap_or_default(),
        });
    }

    let titles: Vec<&str> = slides.iter().map(|s| s.title.as_str()).collect();
    info!("Parsed outline: {} slide(s). Titles: {:?}", slides.len(), titles);
    info!("Using style reference: {}", style_path.display());
    info!(
        "Generating {} image(s) ({} slides × {} per slide, max {} concurrent)...",
        slides.len() * config.copy,
        slides.len(),
        config.copy,
        config.concurrency
    );

    let reference: Arc<[u8]> = tokio::fs::read(style_path)
        .await
        .map_err(|source| SlidegenError::StyleImageReadFailed {
            path: style_path.clone(),
            source,
        })?
        .into();
    let article_context = articles::load_articles(&config.articles).await?;
    let outline_context = build_outline_context(&slides);
    let style = StyleDirective::resolve(true, global_style.as_deref());

    let batch = Batch::for_slides(&slides, config.copy, |s| {
        slide_request(
            s,
            &outline_context,
            style,
            Some(Arc::clone(&reference)),
            article_context.as_deref(),
        )
    });

    run_batch(batch, config, start).await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    outline: &str,
    config: &GeneratorConfig,
) -> Result<GenerationSummary, SlidegenError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlidegenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(outline, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Parse the outline and split off the global style section.
fn renderable_slides(outline: &str) -> Result<(Option<String>, Vec<Slide>), SlidegenError> {
    let slides = parse_outline(outline);
    if slides.is_empty() {
        return Err(SlidegenError::NoSlides);
    }

    let (global_style, renderable) = extract_global_style(&slides);
    if renderable.is_empty() {
        return Err(SlidegenError::OnlyStyleSlide);
    }
    if global_style.is_some() {
        debug!("Outline defines a global style section");
    }
    Ok((global_style, renderable))
}

fn slide_request(
    slide: &Slide,
    outline_context: &str,
    style: StyleDirective<'_>,
    reference: Option<Arc<[u8]>>,
    article_context: Option<&str>,
) -> GenerationRequest {
    let prompt = build_prompt(slide, outline_context, style, article_context.is_some());
    let mut request = GenerationRequest::new(prompt.user).with_system_prompt(prompt.system);
    if let Some(image) = reference {
        request = request.with_reference_image(image);
    }
    if let Some(context) = article_context {
        request = request.with_article_context(context);
    }
    request
}

async fn run_batch(
    batch: Batch,
    config: &GeneratorConfig,
    start: Instant,
) -> Result<GenerationSummary, SlidegenError> {
    let backend = resolve_backend(config)?;
    let assembler = resolve_assembler(config);

    let dispatcher = Dispatcher::from_config(backend, config);
    let outcomes = dispatcher.dispatch(batch.requests()).await;
    let paired = batch.pair(outcomes)?;

    let mut summary = materialize::materialize(paired, &config.output_dir, assembler).await?;
    summary.duration_ms = start.elapsed().as_millis() as u64;
    Ok(summary)
}

/// A pre-built backend wins; otherwise build the OpenRouter client.
fn resolve_backend(config: &GeneratorConfig) -> Result<Arc<dyn ImageBackend>, SlidegenError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    Ok(Arc::new(OpenRouterBackend::new(config)?))
}

fn resolve_assembler(config: &GeneratorConfig) -> Arc<dyn DeckAssembler> {
    match config.assembler {
        Some(ref assembler) => Arc::clone(assembler),
        None => Arc::new(PdfiumAssembler),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_outline_has_no_slides() {
        assert!(matches!(renderable_slides(""), Err(SlidegenError::NoSlides)));
        assert!(matches!(
            renderable_slides("# Title only\n\nprose"),
            Err(SlidegenError::NoSlides)
        ));
    }

    #[test]
    fn style_only_outline_is_rejected() {
        let outline = "## Global Visual Requirements\nnavy and gold";
        assert!(matches!(
            renderable_slides(outline),
            Err(SlidegenError::OnlyStyleSlide)
        ));
    }

    #[test]
    fn style_section_is_split_off() {
        let outline = "## Visual Style\nflat\n\n## Intro\nhello\n\n## End\nbye";
        let (style, slides) = renderable_slides(outline).unwrap();
        assert_eq!(style.as_deref(), Some("flat"));
        let indices: Vec<usize> = slides.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![2, 3]);
    }

    #[test]
    fn slide_request_carries_optional_parts() {
        let slide = Slide::new(2, "Intro", "hello");
        let plain = slide_request(&slide, "ctx", StyleDirective::Adaptive, None, None);
        assert!(plain.prompt.contains("GENERATE SLIDE 2"));
        assert!(plain.system_prompt.is_some());
        assert!(plain.reference_image.is_none());
        assert!(plain.article_context.is_none());

        let image: Arc<[u8]> = Arc::from(&b"img"[..]);
        let full = slide_request(
            &slide,
            "ctx",
            StyleDirective::ReferenceImage,
            Some(image),
            Some("article"),
        );
        assert_eq!(full.reference_image.as_deref(), Some(&b"img"[..]));
        assert_eq!(full.article_context.as_deref(), Some("article"));
    }
}
