//! Page text extraction.
//!
//! Text comes from two sources, in priority order:
//!
//! 1. Blocks: `innerText` of content elements (headings, paragraphs, list
//!    items, controls, ...) in document order.
//! 2. Body text: the rendered text of the whole document, used only when the
//!    blocks yield fewer than `min_lines` distinct lines.
//!
//! Lines are trimmed, deduplicated across both sources and capped at
//! `max_items`. Long or multi-line blocks are split into lines so a single
//! element cannot take the whole budget.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashSet;

// ============================================================================
// TextLimits
// ============================================================================

/// Tuning for [`extract_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimits {
    /// Maximum number of lines kept.
    pub max_items: usize,
    /// Below this many lines, body text is consulted.
    pub min_lines: usize,
    /// Blocks longer than this (in chars) are split into lines.
    pub chunk_threshold: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            max_items: 200,
            min_lines: 10,
            chunk_threshold: 200,
        }
    }
}

// ============================================================================
// extract_text
// ============================================================================

/// Collects distinct text lines, joined with `\n`.
#[must_use]
pub fn extract_text(blocks: &[String], body_text: &str, limits: TextLimits) -> String {
    let mut collector = LineCollector::new(limits.max_items);

    for block in blocks {
        if collector.is_full() {
            break;
        }

        let trimmed = block.trim();
        if trimmed.chars().count() > limits.chunk_threshold || trimmed.contains('\n') {
            trimmed.lines().for_each(|line| collector.push(line));
        } else {
            collector.push(trimmed);
        }
    }

    if collector.len() < limits.min_lines {
        for line in body_text.lines() {
            if collector.is_full() {
                break;
            }
            collector.push(line);
        }
    }

    collector.finish()
}

/// Dedupe set plus capped output.
struct LineCollector<'a> {
    seen: FxHashSet<&'a str>,
    lines: Vec<&'a str>,
    max: usize,
}

impl<'a> LineCollector<'a> {
    fn new(max: usize) -> Self {
        Self {
            seen: FxHashSet::default(),
            lines: Vec::new(),
            max,
        }
    }

    fn push(&mut self, line: &'a str) {
        let line = line.trim();
        if line.is_empty() || self.is_full() {
            return;
        }
        if self.seen.insert(line) {
            self.lines.push(line);
        }
    }

    fn is_full(&self) -> bool {
        self.lines.len() >= self.max
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn blocks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_page_is_empty_text() {
        assert_eq!(extract_text(&[], "", TextLimits::default()), "");
        assert_eq!(extract_text(&blocks(&["  ", "\n"]), "\n\n", TextLimits::default()), "");
    }

    #[test]
    fn test_dedupes_trimmed_blocks() {
        let limits = TextLimits {
            min_lines: 0,
            ..TextLimits::default()
        };
        let text = extract_text(&blocks(&["Sign in", "  Sign in  ", "Register"]), "", limits);
        assert_eq!(text, "Sign in\nRegister");
    }

    #[test]
    fn test_multiline_blocks_are_chunked() {
        let limits = TextLimits {
            min_lines: 0,
            ..TextLimits::default()
        };
        let text = extract_text(&blocks(&["First\n\nSecond", "Second"]), "", limits);
        assert_eq!(text, "First\nSecond");
    }

    #[test]
    fn test_long_blocks_are_chunked() {
        let limits = TextLimits {
            min_lines: 0,
            max_items: 2,
            chunk_threshold: 10,
        };
        let long = "one line that is long\ntwo\nthree";
        let text = extract_text(&blocks(&[long]), "", limits);
        assert_eq!(text, "one line that is long\ntwo");
    }

    #[test]
    fn test_body_text_fills_sparse_pages() {
        let limits = TextLimits {
            min_lines: 3,
            ..TextLimits::default()
        };
        let text = extract_text(&blocks(&["Welcome"]), "Welcome\nNews\n\nFooter", limits);
        assert_eq!(text, "Welcome\nNews\nFooter");
    }

    #[test]
    fn test_body_text_skipped_when_blocks_suffice() {
        let limits = TextLimits {
            min_lines: 1,
            ..TextLimits::default()
        };
        let text = extract_text(&blocks(&["Welcome"]), "Other", limits);
        assert_eq!(text, "Welcome");
    }

    #[test]
    fn test_cap_applies_across_sources() {
        let limits = TextLimits {
            max_items: 3,
            min_lines: 10,
            chunk_threshold: 200,
        };
        let text = extract_text(&blocks(&["a", "b"]), "c\nd\ne", limits);
        assert_eq!(text, "a\nb\nc");
    }

    proptest! {
        #[test]
        fn prop_lines_distinct_nonempty_and_capped(
            raw_blocks in prop::collection::vec("[a-c \\n]{0,12}", 0..30),
            body in "[a-d \\n]{0,80}",
            max_items in 0usize..15,
            min_lines in 0usize..15,
        ) {
            let limits = TextLimits { max_items, min_lines, chunk_threshold: 5 };
            let text = extract_text(&raw_blocks, &body, limits);

            let lines: Vec<&str> = if text.is_empty() { Vec::new() } else { text.split('\n').collect() };
            prop_assert!(lines.len() <= max_items);

            let mut seen = std::collections::HashSet::new();
            for line in &lines {
                prop_assert!(!line.is_empty());
                prop_assert_eq!(line.trim(), *line);
                prop_assert!(seen.insert(*line));
            }
        }
    }
}
