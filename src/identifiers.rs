//! Type-safe identifiers for relay entities.
//!
//! Newtype wrappers keep the different id spaces apart at compile time:
//!
//! | Type | Space |
//! |------|-------|
//! | [`TabId`] | Relay-assigned browser tab id (wire `tabId`) |
//! | [`RequestId`] | Opaque peer token echoed in responses (wire `requestId`) |
//! | [`CommandId`] | DevTools protocol call id |
//! | [`SessionId`] | DevTools flattened session id |
//! | [`TargetId`] | DevTools target id |
//! | [`BackendNodeId`] | DevTools DOM node handle behind a snapshot ref |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// TabId
// ============================================================================

/// Browser tab identifier as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(u32);

impl TabId {
    /// Creates a tab id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TabId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Opaque request token chosen by the peer.
///
/// Kept as raw JSON so it is echoed back byte-for-byte, whether the peer
/// uses strings, numbers, or anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Value);

impl RequestId {
    /// Wraps a raw JSON token.
    #[inline]
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the raw token.
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(token: &str) -> Self {
        Self(Value::String(token.to_string()))
    }
}

// ============================================================================
// CommandId
// ============================================================================

/// Monotonic id of a DevTools protocol call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

/// Process-wide counter; ids only need to be unique per connection.
static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

impl CommandId {
    /// Allocates the next id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SessionId / TargetId
// ============================================================================

/// Flattened DevTools session id returned by `Target.attachToTarget`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// DevTools target id (one per page).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Creates a target id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// BackendNodeId
// ============================================================================

/// Browser-side DOM node handle that survives across protocol calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendNodeId(i64);

impl BackendNodeId {
    /// Wraps a raw backend node id.
    #[inline]
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for BackendNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
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
    fn test_tab_id_is_transparent() {
        let id: TabId = serde_json::from_value(json!(7)).expect("parse");
        assert_eq!(id, TabId::new(7));
        assert_eq!(serde_json::to_value(id).expect("serialize"), json!(7));
    }

    #[test]
    fn test_tab_id_rejects_negative() {
        assert!(serde_json::from_value::<TabId>(json!(-1)).is_err());
    }

    #[test]
    fn test_request_id_echoes_any_token() {
        for token in [json!("r1"), json!(42), json!({"nested": true})] {
            let id: RequestId = serde_json::from_value(token.clone()).expect("parse");
            assert_eq!(serde_json::to_value(&id).expect("serialize"), token);
        }
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::from("r1").to_string(), "r1");
        assert_eq!(RequestId::new(json!(3)).to_string(), "3");
    }

    #[test]
    fn test_command_ids_increase() {
        let a = CommandId::next();
        let b = CommandId::next();
        assert!(b.as_u64() > a.as_u64());
    }
}
