//! DevTools protocol message types.
//!
//! ```text
//! → {"id": 4, "method": "Runtime.evaluate", "params": {...}, "sessionId": "AB12"}
//! ← {"id": 4, "result": {...}, "sessionId": "AB12"}
//! ← {"id": 4, "error": {"code": -32000, "message": "..."}}
//! ← {"method": "Target.targetDestroyed", "params": {...}}
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};

// ============================================================================
// CdpRequest
// ============================================================================

/// Outbound protocol call.
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Correlation id.
    pub id: CommandId,

    /// `Domain.method` name.
    pub method: String,

    /// Method parameters.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,

    /// Flattened session to route the call to; browser target when absent.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl CdpRequest {
    /// Creates a request with a fresh id.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value, session_id: Option<SessionId>) -> Self {
        Self {
            id: CommandId::next(),
            method: method.into(),
            params,
            session_id,
        }
    }
}

// ============================================================================
// CdpResponse
// ============================================================================

/// Reply to a [`CdpRequest`].
#[derive(Debug, Clone, Deserialize)]
pub struct CdpResponse {
    /// Matches the request id.
    pub id: CommandId,

    /// Result object on success.
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object on failure.
    #[serde(default)]
    pub error: Option<CdpError>,
}

impl CdpResponse {
    /// Extracts the result, turning a protocol error into [`Error::Protocol`].
    ///
    /// The browser's message is kept verbatim.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(Error::protocol(err.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Protocol-level error object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CdpError {
    /// JSON-RPC style error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Extra detail.
    #[serde(default)]
    pub data: Option<Value>,
}

// ============================================================================
// CdpEvent
// ============================================================================

/// Notification pushed by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpEvent {
    /// `Domain.event` name.
    pub method: String,

    /// Event payload.
    #[serde(default)]
    pub params: Value,

    /// Session the event belongs to; browser target when absent.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

impl CdpEvent {
    /// Gets a string field from params.
    #[inline]
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

// ============================================================================
// CdpMessage
// ============================================================================

/// Any inbound message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CdpMessage {
    /// Reply to a call (has `id`).
    Response(CdpResponse),
    /// Unsolicited event (has `method`).
    Event(CdpEvent),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_omits_empty_fields() {
        let request = CdpRequest::new("Target.getTargets", Value::Null, None);
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["method"], "Target.getTargets");
        assert!(value.get("params").is_none());
        assert!(value.get("sessionId").is_none());
    }

    #[test]
    fn test_request_with_session() {
        let request = CdpRequest::new(
            "Runtime.evaluate",
            json!({"expression": "1"}),
            Some(SessionId::new("S1")),
        );
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["sessionId"], "S1");
        assert_eq!(value["params"]["expression"], "1");
    }

    #[test]
    fn test_parse_response() {
        let message: CdpMessage =
            serde_json::from_str(r#"{"id": 4, "result": {"targetId": "T1"}}"#).expect("parse");

        match message {
            CdpMessage::Response(response) => {
                let result = response.into_result().expect("success");
                assert_eq!(result["targetId"], "T1");
            }
            CdpMessage::Event(_) => panic!("expected response"),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let message: CdpMessage = serde_json::from_str(
            r#"{"id": 5, "error": {"code": -32000, "message": "No target with given id found"}}"#,
        )
        .expect("parse");

        let CdpMessage::Response(response) = message else {
            panic!("expected response");
        };
        let err = response.into_result().expect_err("error");
        assert_eq!(err.to_string(), "Protocol error: No target with given id found");
    }

    #[test]
    fn test_parse_event() {
        let message: CdpMessage = serde_json::from_str(
            r#"{"method": "Inspector.detached", "params": {"reason": "canceled_by_user"}, "sessionId": "S1"}"#,
        )
        .expect("parse");

        let CdpMessage::Event(event) = message else {
            panic!("expected event");
        };
        assert_eq!(event.method, "Inspector.detached");
        assert_eq!(event.param_str("reason"), Some("canceled_by_user"));
        assert_eq!(event.session_id, Some(SessionId::new("S1")));
    }
}
