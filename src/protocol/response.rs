//! Response envelopes.
//!
//! Every inbound command is answered by exactly one of:
//!
//! ```json
//! { "type": "response", "requestId": "r1", "result": { ... } }
//! { "type": "error", "requestId": "r1", "error": "message" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::identifiers::RequestId;

// ============================================================================
// ResponseEnvelope
// ============================================================================

/// Reply to one command, keyed by the command's request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEnvelope {
    /// Command succeeded.
    Response {
        /// Echo of the command's `requestId`.
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Handler result.
        result: Value,
    },

    /// Command failed.
    Error {
        /// Echo of the command's `requestId`.
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Human-readable failure.
        error: String,
    },
}

impl ResponseEnvelope {
    /// Creates a success envelope.
    #[inline]
    #[must_use]
    pub fn success(request_id: RequestId, result: Value) -> Self {
        Self::Response { request_id, result }
    }

    /// Creates an error envelope from an [`Error`].
    #[inline]
    #[must_use]
    pub fn failure(request_id: RequestId, error: &Error) -> Self {
        Self::Error {
            request_id,
            error: error.to_string(),
        }
    }

    /// Returns the request id this envelope answers.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Response { request_id, .. } | Self::Error { request_id, .. } => request_id,
        }
    }

    /// Returns `true` for error envelopes.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
