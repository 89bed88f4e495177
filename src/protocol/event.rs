//! Unsolicited relay messages.
//!
//! These are pushed to the peer without a matching request:
//!
//! | `type` | When |
//! |--------|------|
//! | `relay_ready` | Once per successful connect, carries the tab registry |
//! | `tab_closed` | An attached tab was closed in the browser |
//! | `tab_navigated` | An attached tab changed URL |
//! | `debugger_detached` | The browser ended a debugging session on its own |
//!
//! Delivery is best-effort; nothing here is queued while disconnected.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::TabId;
use crate::relay::TabEntry;

// ============================================================================
// RelayEvent
// ============================================================================

/// Out-of-band message from relay to peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Connection established; lets the peer reconcile after a restart.
    RelayReady {
        /// Registry contents as `[tabId, entry]` pairs.
        #[serde(rename = "attachedTabs")]
        attached_tabs: Vec<(TabId, TabEntry)>,
    },

    /// Attached tab was closed.
    TabClosed {
        /// Closed tab.
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },

    /// Attached tab navigated.
    TabNavigated {
        /// Navigated tab.
        #[serde(rename = "tabId")]
        tab_id: TabId,
        /// New URL.
        url: String,
    },

    /// Debugging session ended outside the relay's control.
    DebuggerDetached {
        /// Affected tab.
        #[serde(rename = "tabId")]
        tab_id: TabId,
        /// Browser-supplied reason (`canceled_by_user`, ...).
        reason: String,
    },
}

impl RelayEvent {
    /// Returns the wire `type` value.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RelayReady { .. } => "relay_ready",
            Self::TabClosed { .. } => "tab_closed",
            Self::TabNavigated { .. } => "tab_navigated",
            Self::DebuggerDetached { .. } => "debugger_detached",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_relay_ready_empty() {
        let event = RelayEvent::RelayReady {
            attached_tabs: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&event).expect("serialize"),
            json!({"type": "relay_ready", "attachedTabs": []})
        );
    }

    #[test]
    fn test_relay_ready_pairs() {
        let tab = TabId::new(7);
        let event = RelayEvent::RelayReady {
            attached_tabs: vec![(tab, TabEntry::attached(tab, "https://example.com/"))],
        };
        assert_eq!(
            serde_json::to_value(&event).expect("serialize"),
            json!({
                "type": "relay_ready",
                "attachedTabs": [[7, {"tabId": 7, "attached": true, "url": "https://example.com/"}]]
            })
        );
    }

    #[test]
    fn test_out_of_band_shapes() {
        let closed = RelayEvent::TabClosed {
            tab_id: TabId::new(3),
        };
        assert_eq!(
            serde_json::to_value(&closed).expect("serialize"),
            json!({"type": "tab_closed", "tabId": 3})
        );

        let detached = RelayEvent::DebuggerDetached {
            tab_id: TabId::new(3),
            reason: "canceled_by_user".into(),
        };
        assert_eq!(detached.kind(), "debugger_detached");
        assert_eq!(
            serde_json::to_value(&detached).expect("serialize"),
            json!({"type": "debugger_detached", "tabId": 3, "reason": "canceled_by_user"})
        );
    }
}
