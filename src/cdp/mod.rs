//! DevTools protocol client.
//!
//! The relay talks to the browser through a single browser-level DevTools
//! WebSocket. Per-tab sessions are multiplexed over it with flattened
//! `sessionId` routing.
//!
//! ```text
//! ┌──────────────┐      WebSocket       ┌──────────────────┐
//! │ CdpBrowser   │◄────────────────────►│ Browser          │
//! │ CdpConnection│ /devtools/browser/.. │ (remote debugging│
//! │              │                      │  port)           │
//! └──────────────┘                      └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Socket, call correlation, timeouts, event fan-out |
//! | `message` | Request, response and event shapes |

// ============================================================================
// Submodules
// ============================================================================

/// DevTools WebSocket connection and event loop.
pub mod connection;

/// DevTools message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{
    CdpConnection, CdpEvents, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
};
pub use message::{CdpError, CdpEvent, CdpMessage, CdpRequest, CdpResponse};
