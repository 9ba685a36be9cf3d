//! Configuration types for slide image generation.
//!
//! All run behaviour is controlled through [`GeneratorConfig`], built via its
//! [`GeneratorConfigBuilder`]. Validation happens once in
//! [`GeneratorConfigBuilder::build`], so every configuration error surfaces
//! before the first request is dispatched.

use crate::pipeline::assemble::DeckAssembler;
use crate::error::SlidegenError;
use crate::pipeline::backend::ImageBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// OpenRouter's OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Image-capable chat model used in the examples and e2e tests.
pub const DEFAULT_MODEL: &str = "google/gemini-3.1-flash-image-preview";

/// Default cap on simultaneously in-flight requests.
pub const DEFAULT_MAX_CONCURRENT: usize = 36;

/// Configuration for one generation run.
///
/// Built via [`GeneratorConfig::builder()`].
///
/// # Example
/// ```rust
/// use slidegen::GeneratorConfig;
///
/// let config = GeneratorConfig::builder()
///     .api_key("sk-or-...")
///     .model("google/gemini-3.1-flash-image-preview")
///     .concurrency(8)
///     .copy(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Bearer token for the backend.
    pub api_key: String,

    /// API root; requests go to `{base_url}/chat/completions`.
    pub base_url: String,

    /// Model identifier sent with every request. Required.
    pub model: String,

    /// Optional outbound proxy (`http://`, `https://` or `socks5://`).
    pub proxy: Option<String>,

    /// Maximum number of requests in flight at any instant. Default: 36.
    ///
    /// Also bounds the idle connection pool, so the number of open
    /// connections never exceeds the cap.
    pub concurrency: usize,

    /// Per-attempt timeout in seconds. Default: 120.
    ///
    /// Image generation is slow; two minutes covers the long tail of a
    /// loaded backend without letting a hung connection stall the batch.
    pub request_timeout_secs: u64,

    /// Attempts per request, including the first. Default: 3.
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds. Default: 1000.
    pub retry_delay_ms: u64,

    /// Number of image variants per slide. Default: 1.
    pub copy: usize,

    /// Directory receiving `slide_pXX_vYY.png` files and `slide_combined.pdf`.
    pub output_dir: PathBuf,

    /// Which slide indices to generate in all-slides mode. Default: all.
    pub pages: PageSelection,

    /// Style reference image. When set every slide is generated in its
    /// style; when unset only the first slide is generated.
    pub style_image: Option<PathBuf>,

    /// Article files (`.md`, `.markdown`, `.pdf`) used as grounding context.
    pub articles: Vec<PathBuf>,

    /// Pre-constructed backend. Takes precedence over `api_key`/`base_url`.
    pub backend: Option<Arc<dyn ImageBackend>>,

    /// Pre-constructed PDF assembler. Defaults to pdfium.
    pub assembler: Option<Arc<dyn DeckAssembler>>,

    /// Receives per-request progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: String::new(),
            proxy: None,
            concurrency: DEFAULT_MAX_CONCURRENT,
            request_timeout_secs: 120,
            max_attempts: 3,
            retry_delay_ms: 1000,
            copy: 1,
            output_dir: PathBuf::from("./output"),
            pages: PageSelection::default(),
            style_image: None,
            articles: Vec::new(),
            backend: None,
            assembler: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("proxy", &self.proxy)
            .field("concurrency", &self.concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("copy", &self.copy)
            .field("output_dir", &self.output_dir)
            .field("pages", &self.pages)
            .field("style_image", &self.style_image)
            .field("articles", &self.articles)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ImageBackend>"))
            .field("assembler", &self.assembler.as_ref().map(|_| "<dyn DeckAssembler>"))
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into().trim().to_string();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into().trim().to_string();
        self
    }

    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.config.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    /// Not clamped: a zero cap is rejected by [`build`](Self::build).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn copy(mut self, n: usize) -> Self {
        self.config.copy = n;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn style_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.style_image = Some(path.into());
        self
    }

    pub fn articles(mut self, paths: Vec<PathBuf>) -> Self {
        self.config.articles = paths;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn assembler(mut self, assembler: Arc<dyn DeckAssembler>) -> Self {
        self.config.assembler = Some(assembler);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The API key and model are only required when no pre-built backend
    /// was supplied.
    pub fn build(self) -> Result<GeneratorConfig, SlidegenError> {
        let c = &self.config;
        if c.backend.is_none() {
            if c.api_key.is_empty() {
                return Err(SlidegenError::MissingApiKey);
            }
            if c.model.is_empty() {
                return Err(SlidegenError::InvalidConfig(
                    "Model is required. Set --model or OPENROUTER_MODEL.".into(),
                ));
            }
        }
        if c.concurrency == 0 {
            return Err(SlidegenError::InvalidConfig(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if c.copy == 0 {
            return Err(SlidegenError::InvalidConfig(
                "copy must be at least 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(SlidegenError::InvalidConfig(
                "request timeout must be at least 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Which slide indices (1-based) to generate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every renderable slide (default).
    #[default]
    All,
    /// Only the listed slide indices.
    Set(BTreeSet<usize>),
}

impl PageSelection {
    /// Parse a page specification such as `1`, `1,3,5`, `1-5` or `1,3-5,7`.
    ///
    /// Whitespace around parts is ignored. Page numbers start at 1 and
    /// ranges must not be descending.
    pub fn parse(spec: &str) -> Result<Self, SlidegenError> {
        let mut pages = BTreeSet::new();

        for part in spec.split(',').map(str::trim) {
            if let Some((start, end)) = part.split_once('-') {
                let start = parse_page_number(start.trim(), part)?;
                let end = parse_page_number(end.trim(), part)?;
                if start < 1 {
                    return Err(SlidegenError::InvalidPageSpec(format!(
                        "Page numbers must be >= 1, got: {start}"
                    )));
                }
                if start > end {
                    return Err(SlidegenError::InvalidPageSpec(format!(
                        "Invalid range: {start}-{end}. Start must be <= end"
                    )));
                }
                pages.extend(start..=end);
            } else {
                let page = parse_page_number(part, part)?;
                if page < 1 {
                    return Err(SlidegenError::InvalidPageSpec(format!(
                        "Page numbers must be >= 1, got: {page}"
                    )));
                }
                pages.insert(page);
            }
        }

        if pages.is_empty() {
            Ok(PageSelection::All)
        } else {
            Ok(PageSelection::Set(pages))
        }
    }

    /// Whether the slide with this 1-based index is selected.
    pub fn contains(&self, index: usize) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Set(pages) => pages.contains(&index),
        }
    }

    /// Sorted page numbers, or `None` for [`PageSelection::All`].
    pub fn pages(&self) -> Option<Vec<usize>> {
        match self {
            PageSelection::All => None,
            PageSelection::Set(pages) => Some(pages.iter().copied().collect()),
        }
    }
}

fn parse_page_number(s: &str, part: &str) -> Result<usize, SlidegenError> {
    s.parse::<usize>()
        .map_err(|_| SlidegenError::InvalidPageSpec(format!("Invalid page number: '{part}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pages: &[usize]) -> PageSelection {
        PageSelection::Set(pages.iter().copied().collect())
    }

    #[test]
    fn parse_single_and_list() {
        assert_eq!(PageSelection::parse("1").unwrap(), set(&[1]));
        assert_eq!(PageSelection::parse("5").unwrap(), set(&[5]));
        assert_eq!(PageSelection::parse("1,3,5").unwrap(), set(&[1, 3, 5]));
        assert_eq!(PageSelection::parse(" 1 , 3 , 5 ").unwrap(), set(&[1, 3, 5]));
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(PageSelection::parse("1-3").unwrap(), set(&[1, 2, 3]));
        assert_eq!(PageSelection::parse("10-12").unwrap(), set(&[10, 11, 12]));
        assert_eq!(
            PageSelection::parse("1,3-5,7").unwrap(),
            set(&[1, 3, 4, 5, 7])
        );
    }

    #[test]
    fn parse_rejects_invalid_specs() {
        for bad in ["0", "a", "5-1", "0-3", "1,,2", "-1", "1-b"] {
            assert!(
                matches!(
                    PageSelection::parse(bad),
                    Err(SlidegenError::InvalidPageSpec(_))
                ),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn selection_contains() {
        let sel = PageSelection::parse("2-3").unwrap();
        assert!(!sel.contains(1));
        assert!(sel.contains(2));
        assert!(sel.contains(3));
        assert!(PageSelection::All.contains(42));
        assert_eq!(sel.pages(), Some(vec![2, 3]));
        assert_eq!(PageSelection::All.pages(), None);
    }

    #[test]
    fn build_requires_api_key_and_model() {
        assert!(matches!(
            GeneratorConfig::builder().model("m").build(),
            Err(SlidegenError::MissingApiKey)
        ));
        assert!(matches!(
            GeneratorConfig::builder().api_key("   ").model("m").build(),
            Err(SlidegenError::MissingApiKey)
        ));
        assert!(matches!(
            GeneratorConfig::builder().api_key("k").build(),
            Err(SlidegenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn build_rejects_zero_concurrency_and_copy() {
        let base = || GeneratorConfig::builder().api_key("k").model("m");
        assert!(matches!(
            base().concurrency(0).build(),
            Err(SlidegenError::InvalidConfig(_))
        ));
        assert!(matches!(
            base().copy(0).build(),
            Err(SlidegenError::InvalidConfig(_))
        ));
        assert!(base().concurrency(1).copy(1).build().is_ok());
    }

    #[test]
    fn defaults() {
        let c = GeneratorConfig::builder()
            .api_key("k")
            .model(DEFAULT_MODEL)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, DEFAULT_MAX_CONCURRENT);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_delay_ms, 1000);
        assert_eq!(c.request_timeout_secs, 120);
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.pages, PageSelection::All);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = GeneratorConfig::builder()
            .api_key("sk-secret")
            .model("m")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn empty_proxy_is_ignored_and_base_url_trimmed() {
        let c = GeneratorConfig::builder()
            .api_key("k")
            .model("m")
            .proxy(Some("  ".into()))
            .base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(c.proxy, None);
        assert_eq!(c.base_url, "http://localhost:8080/v1");
    }
}
