//! Page snapshots.
//!
//! A snapshot is built fresh on every request from two protocol calls made
//! in parallel:
//!
//! - `Accessibility.getFullAXTree`, simplified by [`tree::simplify_tree`]
//! - a `Runtime.evaluate` of [`PAGE_SCRIPT`], which returns page metadata
//!   and raw text for [`text::extract_text`]
//!
//! ```json
//! {
//!   "page": { "url": "...", "title": "...", "scrollY": 0, "scrollHeight": 2400, "viewportHeight": 800 },
//!   "tree": [ { "ref": "e0", "role": "RootWebArea", "name": "...", "children": [...] } ],
//!   "nodeCount": 312,
//!   "textContent": "line\nline"
//! }
//! ```
//!
//! The refs of the latest snapshot are stored in the tab's registry entry so
//! `click` and `type` can address the same elements.

// ============================================================================
// Submodules
// ============================================================================

/// Snapshot tuning options.
pub mod options;

/// Text extraction.
pub mod text;

/// Accessibility tree simplification.
pub mod tree;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::browser::Browser;
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::interaction::script::evaluate_value;
use crate::relay::{SharedRegistry, ensure_attached};

use self::text::extract_text;
use self::tree::{AxNode, SnapshotNode, simplify_tree};

// ============================================================================
// Re-exports
// ============================================================================

pub use options::SnapshotOptions;

// ============================================================================
// Constants
// ============================================================================

/// Collects page metadata and text blocks in one round trip.
pub const PAGE_SCRIPT: &str = r#"(() => {
  const SELECTORS = [
    'h1', 'h2', 'h3', 'h4', 'h5', 'h6', 'p', 'li', 'td', 'th', 'dt', 'dd',
    'blockquote', 'pre', 'figcaption', 'caption', 'label', 'a', 'button',
    'summary', 'option', '[role="button"]', '[role="link"]', '[role="heading"]',
    '[role="listitem"]', '[role="menuitem"]', '[role="tab"]', '[role="cell"]'
  ].join(',');
  const MAX_BLOCKS = 2000;
  const blocks = [];
  for (const el of document.querySelectorAll(SELECTORS)) {
    if (blocks.length >= MAX_BLOCKS) break;
    const text = el.innerText;
    if (text && text.trim()) blocks.push(text);
  }
  const root = document.documentElement;
  return {
    url: location.href,
    title: document.title,
    scrollY: window.scrollY,
    scrollHeight: root ? root.scrollHeight : 0,
    viewportHeight: window.innerHeight,
    blocks,
    bodyText: document.body ? document.body.innerText : ''
  };
})()"#;

// ============================================================================
// Types
// ============================================================================

/// Page metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Current URL.
    pub url: String,
    /// Document title.
    pub title: String,
    /// Vertical scroll offset.
    pub scroll_y: f64,
    /// Full document height.
    pub scroll_height: f64,
    /// Viewport height.
    pub viewport_height: f64,
}

/// What [`PAGE_SCRIPT`] returns.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PageCapture {
    url: String,
    title: String,
    scroll_y: f64,
    scroll_height: f64,
    viewport_height: f64,
    blocks: Vec<String>,
    body_text: String,
}

/// Compact, referenceable view of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Page metadata.
    pub page: PageInfo,
    /// Simplified accessibility forest.
    pub tree: Vec<SnapshotNode>,
    /// Number of raw accessibility nodes.
    pub node_count: usize,
    /// Extracted text, one line per item.
    pub text_content: String,
}

// ============================================================================
// SnapshotBuilder
// ============================================================================

/// Captures snapshots of attached tabs.
#[derive(Clone)]
pub struct SnapshotBuilder {
    browser: Arc<dyn Browser>,
    registry: SharedRegistry,
    options: SnapshotOptions,
}

impl SnapshotBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(browser: Arc<dyn Browser>, registry: SharedRegistry, options: SnapshotOptions) -> Self {
        Self {
            browser,
            registry,
            options,
        }
    }

    /// Captures a snapshot of an attached tab.
    ///
    /// # Errors
    ///
    /// - [`Error::TabNotAttached`] if the tab has no session
    /// - [`Error::SnapshotFailed`] for anything that goes wrong afterwards
    pub async fn capture(&self, tab_id: TabId) -> Result<Snapshot> {
        ensure_attached(&self.registry, tab_id)?;

        self.capture_attached(tab_id)
            .await
            .map_err(Error::snapshot_failed)
    }

    async fn capture_attached(&self, tab_id: TabId) -> Result<Snapshot> {
        let (ax_tree, page) = tokio::try_join!(
            self.browser
                .send_command(tab_id, "Accessibility.getFullAXTree", json!({})),
            evaluate_value(self.browser.as_ref(), tab_id, PAGE_SCRIPT),
        )?;

        let nodes: Vec<AxNode> = match ax_tree.get("nodes") {
            Some(nodes) => serde_json::from_value(nodes.clone())?,
            None => return Err(Error::protocol("accessibility tree has no nodes")),
        };

        let capture: PageCapture = if page.is_null() {
            PageCapture::default()
        } else {
            serde_json::from_value(page)?
        };

        let text_content = extract_text(&capture.blocks, &capture.body_text, self.options.text_limits());
        let simplified = simplify_tree(&nodes, self.options.include_ignored);

        // A detach during capture leaves nothing to store the refs in.
        if !self.registry.lock().set_refs(tab_id, simplified.refs) {
            return Err(Error::tab_not_attached(tab_id));
        }

        debug!(
            %tab_id,
            nodes = nodes.len(),
            roots = simplified.roots.len(),
            text_lines = text_content.lines().count(),
            "Snapshot captured"
        );

        Ok(Snapshot {
            page: PageInfo {
                url: capture.url,
                title: capture.title,
                scroll_y: capture.scroll_y,
                scroll_height: capture.scroll_height,
                viewport_height: capture.viewport_height,
            },
            tree: simplified.roots,
            node_count: nodes.len(),
            text_content,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
