//! Outline splitting: markdown text → ordered [`Slide`] records.
//!
//! Every second-level heading (`## Title`) opens a slide; the text up to the
//! next `##` heading (or end of input) is that slide's content. Deeper
//! headings (`###`) stay inside the content. A leading `Slide N:` on the
//! heading is presentation numbering, not title, and is stripped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^##[ \t]+(.+)$").unwrap());

static RE_SLIDE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^slide\s+\d+\s*[:.\-–]\s*").unwrap());

/// One slide of the outline. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based position in the outline.
    pub index: usize,
    pub title: String,
    /// Markdown body under the heading, trimmed.
    pub content: String,
}

impl Slide {
    pub fn new(index: usize, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Split an outline into slides in order of appearance.
///
/// Returns an empty vector for empty input or input without `##` headings;
/// callers treat that as fatal.
pub fn parse_outline(markdown: &str) -> Vec<Slide> {
    // (heading start, heading end, raw title)
    let headings: Vec<(usize, usize, &str)> = RE_H2
        .captures_iter(markdown)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = caps.get(1)?;
            Some((whole.start(), whole.end(), title.as_str().trim()))
        })
        .collect();

    headings
        .iter()
        .enumerate()
        .map(|(i, &(_, body_start, raw_title))| {
            let title = RE_SLIDE_PREFIX.replace(raw_title, "").trim().to_string();
            let title = if title.is_empty() {
                raw_title.to_string()
            } else {
                title
            };

            let body_end = headings
                .get(i + 1)
                .map(|&(next_start, _, _)| next_start)
                .unwrap_or(markdown.len());

            Slide::new(i + 1, title, markdown[body_start..body_end].trim())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_outline() {
        let md = "\n## Slide 1: Introduction\nThis is the first slide.\n\n## Slide 2: Details\n- Point 1\n- Point 2\n";
        let slides = parse_outline(md);
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].index, 1);
        assert_eq!(slides[0].title, "Introduction");
        assert_eq!(slides[0].content, "This is the first slide.");
        assert_eq!(slides[1].index, 2);
        assert_eq!(slides[1].title, "Details");
        assert!(slides[1].content.contains("Point 1"));
    }

    #[test]
    fn empty_or_headingless_outline_yields_nothing() {
        assert!(parse_outline("").is_empty());
        assert!(parse_outline("Just some text without H2").is_empty());
        assert!(parse_outline("# Only a title\n### and a subsection").is_empty());
    }

    #[test]
    fn title_without_prefix_is_kept() {
        let slides = parse_outline("## No Prefix Title\nContent");
        assert_eq!(slides[0].title, "No Prefix Title");
        assert_eq!(slides[0].content, "Content");
    }

    #[test]
    fn subsections_stay_in_content() {
        let md = "# Deck\n\n## Agenda\n### Part A\ntext\n## Close\nbye";
        let slides = parse_outline(md);
        assert_eq!(slides.len(), 2);
        assert!(slides[0].content.starts_with("### Part A"));
        assert_eq!(slides[1].content, "bye");
    }

    #[test]
    fn bare_slide_number_heading_keeps_text() {
        let slides = parse_outline("## Slide 3:\nbody");
        assert_eq!(slides[0].title, "Slide 3:");
    }

    #[test]
    fn indices_are_monotonic_from_one() {
        let md = (1..=5)
            .map(|i| format!("## Topic {i}\nbody {i}\n"))
            .collect::<String>();
        let indices: Vec<usize> = parse_outline(&md).iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    }
}
