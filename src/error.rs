//! Error types for the slidegen library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SlidegenError`]: **Fatal**: the run cannot start or finish at all
//!   (missing API key, outline without slides, page filter that matches
//!   nothing, PDF engine unavailable). Returned as `Err(SlidegenError)` from
//!   the top-level `generate*` functions, always before any request is sent
//!   or after every request has settled.
//!
//! * [`RequestError`]: **Non-fatal**: one image request failed (connection
//!   refused, 5xx, malformed body) but the rest of the batch is unaffected.
//!   Stored inside [`crate::output::GenerationOutcome::Failure`] so callers
//!   see partial success instead of losing the whole deck to one variant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slidegen library.
///
/// Per-request failures use [`RequestError`] and never surface here.
#[derive(Debug, Error)]
pub enum SlidegenError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// No API key was supplied by flag, environment or `.env`.
    #[error(
        "OpenRouter API key is required.\n\
Set it via --api-key, the OPENROUTER_API_KEY env var, or in .env \
(OPENROUTER_API_KEY=... or api_key under [openrouter])."
    )]
    MissingApiKey,

    /// `.env` exists but is neither dotenv lines nor an `[openrouter]` INI file.
    #[error("Failed to load {path:?}: {detail}")]
    EnvFileInvalid { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed (bad proxy URL, TLS init).
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Batch validation errors ───────────────────────────────────────────
    /// The outline contains no `##` headings.
    #[error("No slides found in outline (no H2 headings)")]
    NoSlides,

    /// The outline contains only the global style section.
    #[error("Only style slide found in outline")]
    OnlyStyleSlide,

    /// The page filter did not select any slide.
    #[error("No slides match the page filter: {pages:?}")]
    NoPagesMatched { pages: Vec<usize> },

    /// A `--page` specification could not be parsed.
    #[error("Invalid page specification: {0}")]
    InvalidPageSpec(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// An article path or glob did not resolve to an existing file.
    #[error("Article file not found: {pattern}")]
    ArticleNotFound { pattern: String },

    /// A glob pattern for articles matched nothing.
    #[error("No files found matching pattern: {pattern}")]
    NoArticleMatches { pattern: String },

    /// An article path exists but is a directory or other non-file.
    #[error("Not a file: {path:?}")]
    ArticleNotAFile { path: PathBuf },

    /// An article has an extension other than `.pdf`, `.md` or `.markdown`.
    #[error("Unsupported article format '{extension}' for {path:?}. Supported: .markdown, .md, .pdf")]
    UnsupportedArticle { path: PathBuf, extension: String },

    /// An article exists but could not be read or its text extracted.
    #[error("Failed to read article '{path}': {detail}")]
    ArticleReadFailed { path: PathBuf, detail: String },

    /// The style reference image could not be read.
    #[error("Failed to read style reference image '{path}': {source}")]
    StyleImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output image or directory.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every image handed to PDF assembly was missing or unreadable.
    #[error("No valid images to assemble into '{path}'")]
    NoUsableImages { path: PathBuf },

    /// pdfium rejected the document while it was being built or saved.
    #[error("PDF assembly failed for '{path}': {detail}")]
    PdfAssemblyFailed { path: PathBuf, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF assembly and PDF article extraction need a pdfium shared library.\n\
  • Install pdfium so the system loader can find it, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single generation request.
///
/// Only the first four variants are retryable. [`RequestError::Exhausted`]
/// is the terminal form stored in a failed outcome once the attempt budget
/// is spent; it keeps the last underlying error as context.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RequestError {
    /// Connection refused, reset, DNS failure, proxy failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response within the per-attempt timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("{0}")]
    Shape(String),

    /// The request could not be constructed at all. Not retried.
    #[error("could not build request: {0}")]
    Build(String),

    /// All attempts failed; `last` is the error from the final attempt.
    #[error("failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        last: Box<RequestError>,
    },
}

impl RequestError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::Transport(_)
                | RequestError::Timeout { .. }
                | RequestError::Status { .. }
                | RequestError::Shape(_)
        )
    }

    /// The innermost error, unwrapping [`RequestError::Exhausted`].
    pub fn root(&self) -> &RequestError {
        match self {
            RequestError::Exhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(RequestError::Transport("refused".into()).is_retryable());
        assert!(RequestError::Timeout { secs: 120 }.is_retryable());
        assert!(RequestError::Status {
            status: 503,
            body: "busy".into()
        }
        .is_retryable());
        assert!(RequestError::Shape("No choices in response".into()).is_retryable());
        assert!(!RequestError::Build("bad header".into()).is_retryable());
    }

    #[test]
    fn exhausted_is_terminal_and_keeps_last_error() {
        let e = RequestError::Exhausted {
            attempts: 3,
            last: Box::new(RequestError::Shape("No images in response".into())),
        };
        assert!(!e.is_retryable());
        assert_eq!(
            e.root(),
            &RequestError::Shape("No images in response".into())
        );
        let msg = e.to_string();
        assert!(msg.contains("3 attempt"), "got: {msg}");
        assert!(msg.contains("No images in response"), "got: {msg}");
    }

    #[test]
    fn no_pages_matched_display() {
        let e = SlidegenError::NoPagesMatched { pages: vec![4, 9] };
        assert!(e.to_string().contains("[4, 9]"));
    }

    #[test]
    fn status_display() {
        let e = RequestError::Status {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(e.to_string(), "HTTP 429: rate limited");
    }
}
