//! Snapshot tuning options.
//!
//! # Example
//!
//! ```
//! use browser_relay::SnapshotOptions;
//!
//! let options = SnapshotOptions::new()
//!     .with_max_text_items(100)
//!     .with_include_ignored();
//!
//! assert_eq!(options.max_text_items, 100);
//! ```

use super::text::TextLimits;

// ============================================================================
// SnapshotOptions
// ============================================================================

/// Limits and switches for snapshot capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Maximum number of text lines in `textContent`.
    pub max_text_items: usize,

    /// Below this many lines from content blocks, body text is consulted.
    pub min_text_lines: usize,

    /// Blocks longer than this many chars are split into lines.
    pub chunk_threshold: usize,

    /// Keep nodes the browser marks as ignored.
    pub include_ignored: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SnapshotOptions {
    /// Creates options with default limits.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_text_items: 200,
            min_text_lines: 10,
            chunk_threshold: 200,
            include_ignored: false,
        }
    }

    /// Returns the text extraction limits.
    #[inline]
    #[must_use]
    pub const fn text_limits(&self) -> TextLimits {
        TextLimits {
            max_items: self.max_text_items,
            min_lines: self.min_text_lines,
            chunk_threshold: self.chunk_threshold,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SnapshotOptions {
    /// Sets the text line cap.
    #[inline]
    #[must_use]
    pub fn with_max_text_items(mut self, max: usize) -> Self {
        self.max_text_items = max;
        self
    }

    /// Sets the body-text fallback threshold.
    #[inline]
    #[must_use]
    pub fn with_min_text_lines(mut self, min: usize) -> Self {
        self.min_text_lines = min;
        self
    }

    /// Sets the block chunking threshold.
    #[inline]
    #[must_use]
    pub fn with_chunk_threshold(mut self, chars: usize) -> Self {
        self.chunk_threshold = chars;
        self
    }

    /// Keeps ignored accessibility nodes.
    #[inline]
    #[must_use]
    pub fn with_include_ignored(mut self) -> Self {
        self.include_ignored = true;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_text_limits() {
        assert_eq!(SnapshotOptions::default().text_limits(), TextLimits::default());
    }

    #[test]
    fn test_builder_chain() {
        let options = SnapshotOptions::new()
            .with_max_text_items(50)
            .with_min_text_lines(2)
            .with_chunk_threshold(80)
            .with_include_ignored();

        assert_eq!(options.max_text_items, 50);
        assert_eq!(options.min_text_lines, 2);
        assert_eq!(options.chunk_threshold, 80);
        assert!(options.include_ignored);
    }
}
