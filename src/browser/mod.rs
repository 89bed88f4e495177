//! Browser abstraction.
//!
//! The relay never talks to the debugging interface directly. It goes through
//! the [`Browser`] trait, which covers the handful of operations the relay
//! needs, and consumes a stream of [`BrowserEvent`]s for changes it did not
//! cause.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Browser`] | Tab and session operations |
//! | [`BrowserEvent`] | Tab closed, tab URL changed, session detached |
//! | [`CdpBrowser`] | Implementation over the DevTools protocol |
//!
//! Tab ids are small integers assigned by the browser implementation; they
//! stay stable for the lifetime of the tab.

// ============================================================================
// Submodules
// ============================================================================

/// DevTools protocol implementation.
pub mod cdp;

/// In-memory browser for tests.
#[cfg(test)]
pub(crate) mod fake;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identifiers::TabId;

// ============================================================================
// Re-exports
// ============================================================================

pub use cdp::CdpBrowser;

// ============================================================================
// TabInfo
// ============================================================================

/// Metadata for one browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    /// Tab id.
    pub tab_id: TabId,
    /// Current URL.
    pub url: String,
    /// Document title.
    pub title: String,
}

// ============================================================================
// DetachReason
// ============================================================================

/// Why the browser ended a debugging session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachReason {
    /// The tab went away.
    TargetClosed,
    /// The user dismissed the debugging indicator.
    CanceledByUser,
    /// Anything else the browser reports.
    Other(String),
}

impl DetachReason {
    /// Maps a browser-supplied reason string.
    #[must_use]
    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "target_closed" => Self::TargetClosed,
            "canceled_by_user" => Self::CanceledByUser,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the wire string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TargetClosed => "target_closed",
            Self::CanceledByUser => "canceled_by_user",
            Self::Other(reason) => reason,
        }
    }
}

impl fmt::Display for DetachReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BrowserEvent
// ============================================================================

/// Change the browser reports on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// Tab was closed.
    TabClosed {
        /// Closed tab.
        tab_id: TabId,
    },

    /// Tab metadata changed.
    TabUpdated {
        /// Updated tab.
        tab_id: TabId,
        /// URL after the change.
        url: String,
    },

    /// Debugging session ended without a `detach` from the relay.
    DebuggerDetached {
        /// Affected tab.
        tab_id: TabId,
        /// Browser-supplied reason.
        reason: DetachReason,
    },
}

impl BrowserEvent {
    /// Returns the tab the event concerns.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        match self {
            Self::TabClosed { tab_id }
            | Self::TabUpdated { tab_id, .. }
            | Self::DebuggerDetached { tab_id, .. } => *tab_id,
        }
    }
}

/// Receiving half of a browser event stream.
pub type BrowserEvents = mpsc::UnboundedReceiver<BrowserEvent>;

// ============================================================================
// Browser
// ============================================================================

/// Operations the relay performs against the browser.
///
/// Implementations must be safe to call concurrently; the relay issues calls
/// for different tabs in parallel.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Lists open page tabs.
    async fn list_tabs(&self) -> Result<Vec<TabInfo>>;

    /// Reads current metadata for one tab.
    ///
    /// Fails with [`Error::TabNotFound`](crate::Error::TabNotFound) for
    /// unknown tabs.
    async fn tab_info(&self, tab_id: TabId) -> Result<TabInfo>;

    /// Opens a new tab at `url`.
    async fn open_tab(&self, url: &str) -> Result<TabInfo>;

    /// Closes a tab.
    async fn close_tab(&self, tab_id: TabId) -> Result<()>;

    /// Opens a debugging session for a tab.
    async fn attach(&self, tab_id: TabId) -> Result<()>;

    /// Closes the debugging session for a tab.
    async fn detach(&self, tab_id: TabId) -> Result<()>;

    /// Sends a protocol command over the tab's debugging session.
    async fn send_command(&self, tab_id: TabId, method: &str, params: Value) -> Result<Value>;

    /// Releases the connection to the browser.
    ///
    /// Called once when the relay stops. The default does nothing.
    fn shutdown(&self) {}
}

// ============================================================================
// Tests
// ============================================================================
