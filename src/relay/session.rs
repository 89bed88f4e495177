//! Debugging-session lifecycle.
//!
//! [`SessionController`] is the only writer of registry entries. It opens and
//! closes sessions on request and folds browser-side changes (tab closed,
//! session dismissed, navigation) back into the registry, producing the
//! matching out-of-band [`RelayEvent`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::browser::{Browser, BrowserEvent, DetachReason};
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::protocol::RelayEvent;

use super::registry::{SharedRegistry, TabEntry};

// ============================================================================
// Constants
// ============================================================================

/// Protocol domains enabled on every new session.
pub const REQUIRED_DOMAINS: [&str; 4] = ["Page", "DOM", "Runtime", "Accessibility"];

// ============================================================================
// ensure_attached
// ============================================================================

/// Returns the tab's entry, or fails if the tab has no debugging session.
///
/// Never attaches on demand.
///
/// # Errors
///
/// [`Error::TabNotAttached`].
pub fn ensure_attached(registry: &SharedRegistry, tab_id: TabId) -> Result<TabEntry> {
    registry
        .lock()
        .get(tab_id)
        .filter(|entry| entry.attached)
        .ok_or_else(|| Error::tab_not_attached(tab_id))
}

// ============================================================================
// SessionController
// ============================================================================

/// Opens, closes and tracks debugging sessions.
#[derive(Clone)]
pub struct SessionController {
    browser: Arc<dyn Browser>,
    registry: SharedRegistry,
}

impl SessionController {
    /// Creates a controller over a browser and registry.
    #[must_use]
    pub fn new(browser: Arc<dyn Browser>, registry: SharedRegistry) -> Self {
        Self { browser, registry }
    }

    /// Opens a debugging session for a tab.
    ///
    /// Attaching an attached tab succeeds with `alreadyAttached: true` and
    /// does not open a second session.
    ///
    /// # Errors
    ///
    /// Session open failures, verbatim. If enabling a domain fails the entry
    /// is removed again and the session closed before the error is returned.
    pub async fn attach(&self, tab_id: TabId) -> Result<Value> {
        if let Some(entry) = self.registry.lock().get(tab_id).filter(|e| e.attached) {
            return Ok(json!({
                "success": true,
                "tabId": tab_id,
                "url": entry.url,
                "alreadyAttached": true,
            }));
        }

        self.browser.attach(tab_id).await?;

        let url = match self.browser.tab_info(tab_id).await {
            Ok(info) => info.url,
            Err(e) => {
                self.abandon(tab_id).await;
                return Err(e);
            }
        };

        self.registry.lock().set(TabEntry::attached(tab_id, url.clone()));

        for domain in REQUIRED_DOMAINS {
            let method = format!("{domain}.enable");
            if let Err(e) = self.browser.send_command(tab_id, &method, json!({})).await {
                warn!(%tab_id, %method, error = %e, "Domain enable failed");
                self.registry.lock().delete(tab_id);
                self.abandon(tab_id).await;
                return Err(e);
            }
        }

        info!(%tab_id, %url, "Attached");

        Ok(json!({
            "success": true,
            "tabId": tab_id,
            "url": url,
        }))
    }

    /// Closes the debugging session for a tab.
    ///
    /// The entry is removed before the session is closed. A close failure is
    /// reported as `detachError` but still counts as success.
    ///
    /// # Errors
    ///
    /// None in practice; kept fallible for a uniform handler signature.
    pub async fn detach(&self, tab_id: TabId) -> Result<Value> {
        if self.registry.lock().delete(tab_id).is_none() {
            return Ok(json!({
                "success": true,
                "tabId": tab_id,
                "wasNotAttached": true,
            }));
        }

        let mut result = json!({ "success": true, "tabId": tab_id });

        match self.browser.detach(tab_id).await {
            Ok(()) => info!(%tab_id, "Detached"),
            Err(e) => {
                warn!(%tab_id, error = %e, "Session close failed after registry cleanup");
                result["detachError"] = Value::String(e.to_string());
            }
        }

        Ok(result)
    }

    /// Closes a tab, dropping its entry first.
    ///
    /// # Errors
    ///
    /// Browser failures from closing the tab.
    pub async fn close(&self, tab_id: TabId) -> Result<Value> {
        let was_attached = self.registry.lock().delete(tab_id).is_some();

        if was_attached && let Err(e) = self.browser.detach(tab_id).await {
            debug!(%tab_id, error = %e, "Detach before close failed");
        }

        self.browser.close_tab(tab_id).await?;
        info!(%tab_id, "Closed tab");

        Ok(json!({ "success": true, "tabId": tab_id }))
    }

    /// Folds a browser-side change into the registry.
    ///
    /// Returns the event to announce, if any. Runs regardless of transport
    /// state.
    #[must_use]
    pub fn handle_browser_event(&self, event: BrowserEvent) -> Option<RelayEvent> {
        match event {
            BrowserEvent::TabClosed { tab_id } => {
                self.registry.lock().delete(tab_id)?;
                info!(%tab_id, "Attached tab closed");
                Some(RelayEvent::TabClosed { tab_id })
            }

            // Tab closure is reported once, as tab_closed.
            BrowserEvent::DebuggerDetached {
                reason: DetachReason::TargetClosed,
                ..
            } => None,

            BrowserEvent::DebuggerDetached { tab_id, reason } => {
                self.registry.lock().delete(tab_id)?;
                info!(%tab_id, %reason, "Debugger detached externally");
                Some(RelayEvent::DebuggerDetached {
                    tab_id,
                    reason: reason.to_string(),
                })
            }

            BrowserEvent::TabUpdated { tab_id, url } => {
                if !self.registry.lock().update_url(tab_id, &url) {
                    return None;
                }
                debug!(%tab_id, %url, "Attached tab navigated");
                Some(RelayEvent::TabNavigated { tab_id, url })
            }
        }
    }

    /// Best-effort session close after a failed attach.
    async fn abandon(&self, tab_id: TabId) {
        if let Err(e) = self.browser.detach(tab_id).await {
            debug!(%tab_id, error = %e, "Cleanup detach failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
