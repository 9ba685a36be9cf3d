//! Generation requests and the batch that keys them to slide variants.
//!
//! A [`Batch`] stores every request next to the [`SlotKey`] it will be saved
//! under. The dispatcher only sees [`Batch::requests`]; the materializer
//! zips the returned outcomes with [`Batch::keys`]. Both views are backed by
//! vectors that are only ever pushed together, so position `i` of the
//! outcome list always belongs to key `i`.

use crate::error::SlidegenError;
use crate::output::GenerationOutcome;
use crate::pipeline::outline::Slide;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One image to generate. Cheap to clone: large fields are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: Arc<str>,
    pub system_prompt: Option<Arc<str>>,
    /// Raw image bytes sent as a PNG data URI next to the prompt.
    pub reference_image: Option<Arc<[u8]>>,
    /// Article text sent as a prior assistant message.
    pub article_context: Option<Arc<str>>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<Arc<str>>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            reference_image: None,
            article_context: None,
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<Arc<str>>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_reference_image(mut self, image: impl Into<Arc<[u8]>>) -> Self {
        self.reference_image = Some(image.into());
        self
    }

    pub fn with_article_context(mut self, context: impl Into<Arc<str>>) -> Self {
        self.article_context = Some(context.into());
        self
    }
}

/// The (slide, variant) a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    /// 1-based slide index from the outline.
    pub slide_index: usize,
    /// 1-based variant number, `1..=copy`.
    pub variant: usize,
}

impl SlotKey {
    pub fn new(slide_index: usize, variant: usize) -> Self {
        Self {
            slide_index,
            variant,
        }
    }

    /// File name without extension: `slide_p{slide:02}_v{variant:02}`.
    pub fn file_stem(&self) -> String {
        format!("slide_p{:02}_v{:02}", self.slide_index, self.variant)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slide {} variant {}", self.slide_index, self.variant)
    }
}

/// Ordered requests with their slot keys.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    keys: Vec<SlotKey>,
    requests: Vec<GenerationRequest>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate slides in order (outer) and variants `1..=copy` (inner).
    ///
    /// `build` runs once per slide; its request is shared by all variants.
    pub fn for_slides(
        slides: &[Slide],
        copy: usize,
        mut build: impl FnMut(&Slide) -> GenerationRequest,
    ) -> Self {
        let mut batch = Self {
            keys: Vec::with_capacity(slides.len() * copy),
            requests: Vec::with_capacity(slides.len() * copy),
        };
        for slide in slides {
            let request = build(slide);
            for variant in 1..=copy {
                batch.push(SlotKey::new(slide.index, variant), request.clone());
            }
        }
        batch
    }

    pub fn push(&mut self, key: SlotKey, request: GenerationRequest) {
        self.keys.push(key);
        self.requests.push(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn keys(&self) -> &[SlotKey] {
        &self.keys
    }

    pub fn requests(&self) -> &[GenerationRequest] {
        &self.requests
    }

    /// Attach dispatcher outcomes to their keys.
    ///
    /// Fails if the outcome list does not line up with the batch, which
    /// would mean an image could be saved under another slide's name.
    pub fn pair(
        &self,
        outcomes: Vec<GenerationOutcome>,
    ) -> Result<Vec<(SlotKey, GenerationOutcome)>, SlidegenError> {
        if outcomes.len() != self.keys.len() {
            return Err(SlidegenError::Internal(format!(
                "dispatcher returned {} outcomes for {} requests",
                outcomes.len(),
                self.keys.len()
            )));
        }
        Ok(self.keys.iter().copied().zip(outcomes).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;

    fn slides(n: usize) -> Vec<Slide> {
        (1..=n).map(|i| Slide::new(i, format!("T{i}"), "c")).collect()
    }

    #[test]
    fn file_stem_is_zero_padded() {
        assert_eq!(SlotKey::new(3, 1).file_stem(), "slide_p03_v01");
        assert_eq!(SlotKey::new(12, 10).file_stem(), "slide_p12_v10");
        assert_eq!(SlotKey::new(123, 2).file_stem(), "slide_p123_v02");
    }

    #[test]
    fn batch_enumerates_slides_then_variants() {
        let batch = Batch::for_slides(&slides(3), 2, |s| GenerationRequest::new(s.title.clone()));
        assert_eq!(batch.len(), 6);
        let keys: Vec<(usize, usize)> = batch
            .keys()
            .iter()
            .map(|k| (k.slide_index, k.variant))
            .collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1), (2, 2), (3, 1), (3, 2)]);
        assert_eq!(&*batch.requests()[3].prompt, "T2");
    }

    #[test]
    fn build_runs_once_per_slide() {
        let mut calls = 0;
        let batch = Batch::for_slides(&slides(4), 3, |_| {
            calls += 1;
            GenerationRequest::new("p")
        });
        assert_eq!(calls, 4);
        assert_eq!(batch.len(), 12);
    }

    #[test]
    fn pair_rejects_misaligned_outcomes() {
        let batch = Batch::for_slides(&slides(2), 1, |_| GenerationRequest::new("p"));
        let short = vec![GenerationOutcome::Success(vec![1])];
        assert!(matches!(batch.pair(short), Err(SlidegenError::Internal(_))));

        let aligned = vec![
            GenerationOutcome::Success(vec![1]),
            GenerationOutcome::Failure(RequestError::Shape("No choices in response".into())),
        ];
        let paired = batch.pair(aligned).unwrap();
        assert_eq!(paired[1].0, SlotKey::new(2, 1));
        assert!(!paired[1].1.is_success());
    }

    #[test]
    fn request_builder_sets_optional_parts() {
        let r = GenerationRequest::new("draw")
            .with_system_prompt("sys")
            .with_reference_image(vec![1u8, 2, 3])
            .with_article_context("article");
        assert_eq!(r.system_prompt.as_deref(), Some("sys"));
        assert_eq!(r.reference_image.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(r.article_context.as_deref(), Some("article"));
    }
}
