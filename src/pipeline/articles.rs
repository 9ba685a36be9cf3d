//! Article loading: resolve `--article` paths and globs, then read them.
//!
//! Markdown articles are read as UTF-8 text. PDF articles have their text
//! layer extracted with pdfium inside `spawn_blocking`; scanned PDFs without
//! a text layer contribute an empty string and a warning.

use crate::error::SlidegenError;
use crate::pipeline::assemble::bind_pdfium;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Separator placed between article texts in the grounding message.
pub const ARTICLE_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleKind {
    Pdf,
    Markdown,
}

impl ArticleKind {
    /// Classify by extension, case-insensitively.
    pub fn of(path: &Path) -> Option<Self> {
        match extension_of(path).as_str() {
            ".pdf" => Some(ArticleKind::Pdf),
            ".md" | ".markdown" => Some(ArticleKind::Markdown),
            _ => None,
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']'])
}

/// Expand article paths and glob patterns, preserving argument order.
///
/// A plain path must exist; a glob must match at least one path. Every
/// result must be a regular file with a supported extension.
pub fn expand_article_paths<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>, SlidegenError> {
    let mut paths = Vec::new();

    for pattern in patterns.iter().map(AsRef::as_ref) {
        if is_glob(pattern) {
            let matched: Vec<PathBuf> = glob::glob(pattern)
                .map_err(|e| {
                    SlidegenError::InvalidConfig(format!("Invalid article pattern '{pattern}': {e}"))
                })?
                .filter_map(Result::ok)
                .collect();
            if matched.is_empty() {
                return Err(SlidegenError::NoArticleMatches {
                    pattern: pattern.to_string(),
                });
            }
            debug!("Article pattern {pattern} matched {} file(s)", matched.len());
            paths.extend(matched);
        } else {
            let path = PathBuf::from(pattern);
            if !path.exists() {
                return Err(SlidegenError::ArticleNotFound {
                    pattern: pattern.to_string(),
                });
            }
            paths.push(path);
        }
    }

    for path in &paths {
        if !path.is_file() {
            return Err(SlidegenError::ArticleNotAFile { path: path.clone() });
        }
        if ArticleKind::of(path).is_none() {
            return Err(SlidegenError::UnsupportedArticle {
                path: path.clone(),
                extension: extension_of(path),
            });
        }
    }

    Ok(paths)
}

/// Counts by kind, rendered as `3 files (1 PDF, 2 Markdown)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArticleCounts {
    pub pdf: usize,
    pub markdown: usize,
}

impl ArticleCounts {
    pub fn of(paths: &[PathBuf]) -> Self {
        paths
            .iter()
            .fold(Self::default(), |mut counts, p| {
                match ArticleKind::of(p) {
                    Some(ArticleKind::Pdf) => counts.pdf += 1,
                    Some(ArticleKind::Markdown) => counts.markdown += 1,
                    None => {}
                }
                counts
            })
    }
}

impl fmt::Display for ArticleCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds = Vec::new();
        if self.pdf > 0 {
            kinds.push(format!("{} PDF", self.pdf));
        }
        if self.markdown > 0 {
            kinds.push(format!("{} Markdown", self.markdown));
        }
        write!(f, "{} files ({})", self.pdf + self.markdown, kinds.join(", "))
    }
}

/// Read every article and join their texts with [`ARTICLE_SEPARATOR`].
///
/// Returns `None` when `paths` is empty.
pub async fn load_articles(paths: &[PathBuf]) -> Result<Option<String>, SlidegenError> {
    if paths.is_empty() {
        return Ok(None);
    }

    let mut texts = Vec::with_capacity(paths.len());
    for path in paths {
        let text = match ArticleKind::of(path) {
            Some(ArticleKind::Markdown) => tokio::fs::read_to_string(path).await.map_err(|e| {
                SlidegenError::ArticleReadFailed {
                    path: path.clone(),
                    detail: e.to_string(),
                }
            })?,
            Some(ArticleKind::Pdf) => {
                let owned = path.clone();
                tokio::task::spawn_blocking(move || extract_pdf_text(&owned))
                    .await
                    .map_err(|e| SlidegenError::Internal(format!("PDF text task panicked: {e}")))??
            }
            None => {
                return Err(SlidegenError::UnsupportedArticle {
                    path: path.clone(),
                    extension: extension_of(path),
                })
            }
        };
        debug!("Article {}: {} chars", path.display(), text.len());
        texts.push(text);
    }

    let joined = texts.join(ARTICLE_SEPARATOR);
    info!(
        "Loaded {} article(s), {} chars of context",
        paths.len(),
        joined.len()
    );
    Ok(Some(joined))
}

/// Extract the text layer of every page, pages separated by blank lines.
fn extract_pdf_text(path: &Path) -> Result<String, SlidegenError> {
    let pdfium = bind_pdfium()?;
    let fail = |detail: String| SlidegenError::ArticleReadFailed {
        path: path.to_path_buf(),
        detail,
    };

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| fail(format!("{e:?}")))?;

    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| fail(format!("page {}: {e:?}", idx + 1)))?;
        pages.push(text.all());
    }

    let text = pages.join("\n\n");
    if text.trim().is_empty() {
        warn!("{} has no extractable text layer", path.display());
    }
    Ok(text)
}
