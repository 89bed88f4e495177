//! Interaction executor.
//!
//! Turns high-level actions into protocol calls against an attached tab. No
//! operation here touches the registry beyond reading it.
//!
//! | Action | Protocol calls |
//! |--------|----------------|
//! | `click` | resolve element, `Runtime.callFunctionOn` |
//! | `type` | resolve element, `Runtime.callFunctionOn` (focus), `Input.insertText` |
//! | `scroll` | `Runtime.evaluate` (`window.scrollBy`) |
//! | `evaluate` | `Runtime.evaluate` |
//! | `screenshot` | `Page.captureScreenshot` |
//!
//! Elements are addressed by CSS selector or by a ref from the tab's latest
//! snapshot. Refs resolve through the stored backend node id, so a ref whose
//! element is gone fails instead of hitting whatever now sits at the same
//! position.

// ============================================================================
// Submodules
// ============================================================================

/// Element resolution, click and type.
pub mod element;

/// Screenshot capture.
pub mod screenshot;

/// Script evaluation.
pub mod script;

/// Page scrolling.
pub mod scroll;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::browser::Browser;
use crate::relay::SharedRegistry;

// ============================================================================
// Re-exports
// ============================================================================

pub use scroll::SCROLL_AMOUNT;

// ============================================================================
// Executor
// ============================================================================

/// Runs interaction commands.
#[derive(Clone)]
pub struct Executor {
    browser: Arc<dyn Browser>,
    registry: SharedRegistry,
}

impl Executor {
    /// Creates an executor.
    #[must_use]
    pub fn new(browser: Arc<dyn Browser>, registry: SharedRegistry) -> Self {
        Self { browser, registry }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use crate::browser::fake::FakeBrowser;
    use crate::identifiers::TabId;
    use crate::relay::{TabEntry, TabRegistry};

    /// Executor over a fake browser with tab 7 attached.
    pub(crate) async fn attached_executor() -> (Executor, Arc<FakeBrowser>, TabId) {
        let (executor, browser, _registry, tab) = attached_executor_with_registry().await;
        (executor, browser, tab)
    }

    pub(crate) async fn attached_executor_with_registry()
    -> (Executor, Arc<FakeBrowser>, SharedRegistry, TabId) {
        let (browser, _events) = FakeBrowser::new();
        let registry = TabRegistry::shared();
        let tab = browser.add_tab(7, "https://example.com/");
        browser.attach(tab).await.expect("session");
        registry
            .lock()
            .set(TabEntry::attached(tab, "https://example.com/"));

        let executor = Executor::new(browser.clone(), Arc::clone(&registry));
        (executor, browser, registry, tab)
    }

    #[tokio::test]
    async fn test_unattached_tab_rejected_everywhere() {
        let (browser, _events) = FakeBrowser::new();
        let executor = Executor::new(browser, TabRegistry::shared());
        let tab = TabId::new(9);

        let errors = [
            executor.evaluate(tab, "1").await.expect_err("evaluate"),
            executor
                .scroll(tab, crate::protocol::Direction::Down)
                .await
                .expect_err("scroll"),
            executor.screenshot(tab).await.expect_err("screenshot"),
        ];

        for err in errors {
            assert_eq!(err.to_string(), "Tab 9 is not attached. Call 'attach' first.");
        }
    }
}
