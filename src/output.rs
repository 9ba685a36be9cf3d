//! Result types: per-request outcomes and per-run summaries.

use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How many failure messages a [`BatchReport`] previews.
pub const FAILURE_PREVIEW: usize = 3;

/// Terminal result of one generation request.
///
/// The dispatcher returns exactly one per request, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Decoded image bytes.
    Success(Vec<u8>),
    /// The error that ended the request, usually [`RequestError::Exhausted`].
    Failure(RequestError),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    pub fn image(&self) -> Option<&[u8]> {
        match self {
            GenerationOutcome::Success(bytes) => Some(bytes),
            GenerationOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RequestError> {
        match self {
            GenerationOutcome::Success(_) => None,
            GenerationOutcome::Failure(e) => Some(e),
        }
    }
}

impl From<Result<Vec<u8>, RequestError>> for GenerationOutcome {
    fn from(result: Result<Vec<u8>, RequestError>) -> Self {
        match result {
            Ok(bytes) => GenerationOutcome::Success(bytes),
            Err(e) => GenerationOutcome::Failure(e),
        }
    }
}

/// Success/failure counts for one batch, with a bounded failure preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The first [`FAILURE_PREVIEW`] failure messages, in batch order.
    pub failure_preview: Vec<String>,
    /// Failures beyond the preview.
    pub more_failures: usize,
}

impl BatchReport {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a GenerationOutcome>) -> Self {
        let mut report = BatchReport::default();
        for outcome in outcomes {
            report.total += 1;
            match outcome {
                GenerationOutcome::Success(_) => report.succeeded += 1,
                GenerationOutcome::Failure(e) => {
                    report.failed += 1;
                    if report.failure_preview.len() < FAILURE_PREVIEW {
                        report.failure_preview.push(e.to_string());
                    } else {
                        report.more_failures += 1;
                    }
                }
            }
        }
        report
    }

    /// Human-readable summary, one line per entry.
    pub fn lines(&self) -> Vec<String> {
        if self.failed == 0 {
            return vec![format!(
                "Generated {}/{} image(s) successfully.",
                self.succeeded, self.total
            )];
        }

        let mut lines = vec![format!(
            "API returned: {}/{} succeeded, {} failed",
            self.succeeded, self.total, self.failed
        )];
        for (i, msg) in self.failure_preview.iter().enumerate() {
            lines.push(format!("  Failure {}: {}", i + 1, msg));
        }
        if self.more_failures > 0 {
            lines.push(format!("  ... and {} more", self.more_failures));
        }
        lines
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub report: BatchReport,
    pub output_dir: PathBuf,
    /// Saved image paths grouped by slide index, variants in order.
    pub saved: BTreeMap<usize, Vec<PathBuf>>,
    /// The combined PDF, absent when no image was saved or assembly failed.
    pub pdf: Option<PathBuf>,
    /// Why the combined PDF is missing although images were saved.
    pub pdf_error: Option<String>,
    pub duration_ms: u64,
}

impl GenerationSummary {
    pub fn saved_count(&self) -> usize {
        self.saved.values().map(Vec::len).sum()
    }

    /// All saved paths in slide order, then variant order.
    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saved.values().flatten().cloned().collect()
    }
}
