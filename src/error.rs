//! Error types for the browser relay.
//!
//! Every fallible operation returns [`Result<T>`] which uses [`Error`].
//! The command dispatcher turns any [`Error`] into an error envelope by its
//! `Display` text, so the messages below are part of what the peer sees.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Command | [`Error::UnknownAction`], [`Error::InvalidArgument`], [`Error::MalformedCommand`] |
//! | Protocol | [`Error::Protocol`], [`Error::ScriptError`] |
//! | Tabs | [`Error::TabNotFound`], [`Error::TabNotAttached`] |
//! | Elements | [`Error::ElementNotFound`], [`Error::StaleRef`] |
//! | Snapshot | [`Error::SnapshotFailed`] |
//! | Timing | [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::TabId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by [`RelayBuilder::build`](crate::RelayBuilder::build) and the
    /// browser backend when settings are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connecting took longer than allowed.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// Inbound command named an action the relay does not implement.
    #[error("Unknown action: {action}")]
    UnknownAction {
        /// The unrecognized action name.
        action: String,
    },

    /// Invalid or missing command argument.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Inbound command could not be decoded.
    #[error("Malformed command: {message}")]
    MalformedCommand {
        /// Decoder error text.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The debugging interface rejected a call.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol failure.
        message: String,
    },

    /// A page script threw.
    #[error("Script error: {message}")]
    ScriptError {
        /// Exception message from the page.
        message: String,
    },

    /// A command handler panicked.
    #[error("Internal error while handling '{action}'")]
    HandlerPanicked {
        /// Action being handled.
        action: String,
    },

    // ========================================================================
    // Tab Errors
    // ========================================================================
    /// The browser has no tab with this id.
    #[error("Tab not found: {tab_id}")]
    TabNotFound {
        /// The missing tab id.
        tab_id: TabId,
    },

    /// The tab has no debugging session.
    #[error("Tab {tab_id} is not attached. Call 'attach' first.")]
    TabNotAttached {
        /// The unattached tab id.
        tab_id: TabId,
    },

    // ========================================================================
    // Element Errors
    // ========================================================================
    /// Selector matched nothing.
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Selector that was queried.
        selector: String,
    },

    /// Ref does not map to a live node of the current page.
    #[error("Stale element ref '{element_ref}': {reason}. Take a new snapshot.")]
    StaleRef {
        /// The synthetic ref (`e12`).
        element_ref: String,
        /// Why the ref could not be resolved.
        reason: String,
    },

    // ========================================================================
    // Snapshot Errors
    // ========================================================================
    /// Snapshot capture failed; no partial snapshot is returned.
    #[error("Snapshot failed: {cause}")]
    SnapshotFailed {
        /// Underlying failure text.
        cause: String,
    },

    // ========================================================================
    // Timing Errors
    // ========================================================================
    /// A protocol call did not complete in time.
    #[error("Request {method} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Protocol method that timed out.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// DevTools WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates an unknown action error.
    #[inline]
    pub fn unknown_action(action: impl Into<String>) -> Self {
        Self::UnknownAction {
            action: action.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error for a missing command field.
    #[inline]
    pub fn missing_field(field: &str, action: &str) -> Self {
        Self::invalid_argument(format!(
            "missing required field '{field}' for action '{action}'"
        ))
    }

    /// Creates a malformed command error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedCommand {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates a handler panic error.
    #[inline]
    pub fn handler_panicked(action: impl Into<String>) -> Self {
        Self::HandlerPanicked {
            action: action.into(),
        }
    }

    /// Creates a tab not found error.
    #[inline]
    pub fn tab_not_found(tab_id: TabId) -> Self {
        Self::TabNotFound { tab_id }
    }

    /// Creates a tab not attached error.
    #[inline]
    pub fn tab_not_attached(tab_id: TabId) -> Self {
        Self::TabNotAttached { tab_id }
    }

    /// Creates an element not found error.
    #[inline]
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Creates a stale ref error.
    #[inline]
    pub fn stale_ref(element_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StaleRef {
            element_ref: element_ref.into(),
            reason: reason.into(),
        }
    }

    /// Wraps any failure as a snapshot failure.
    #[inline]
    pub fn snapshot_failed(cause: impl std::fmt::Display) -> Self {
        Self::SnapshotFailed {
            cause: cause.to_string(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            method: method.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
