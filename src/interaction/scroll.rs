//! Page scrolling.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::Result;
use crate::identifiers::TabId;
use crate::protocol::Direction;
use crate::relay::ensure_attached;

use super::Executor;
use super::script::evaluate_value;

/// Pixels moved per `scroll` command.
pub const SCROLL_AMOUNT: i32 = 500;

// ============================================================================
// Executor - Scroll
// ============================================================================

impl Executor {
    /// Scrolls the page by [`SCROLL_AMOUNT`] pixels.
    ///
    /// Result: `{ "success": true, "direction": "<direction>" }`.
    ///
    /// # Errors
    ///
    /// - [`Error::TabNotAttached`](crate::Error::TabNotAttached)
    /// - [`Error::ScriptError`](crate::Error::ScriptError) if the page throws
    pub async fn scroll(&self, tab_id: TabId, direction: Direction) -> Result<Value> {
        ensure_attached(&self.registry, tab_id)?;

        let (x, y) = direction.offset(SCROLL_AMOUNT);
        debug!(%tab_id, x, y, "Scrolling by");

        let script = format!("window.scrollBy({x}, {y});");
        evaluate_value(self.browser.as_ref(), tab_id, &script).await?;

        Ok(json!({ "success": true, "direction": direction.as_str() }))
    }
}

// ============================================================================
// Tests
// ============================================================================
