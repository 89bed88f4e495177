//! Browser Relay - drive already-authenticated browser tabs from a desktop app.
//!
//! The relay sits between a local desktop application and a running
//! browser. It keeps a WebSocket connection to the app, receives JSON
//! commands, executes them against browser tabs over the DevTools protocol,
//! and answers with exactly one correlated response per command.
//!
//! # Architecture
//!
//! - **Peer (desktop app)**: Sends commands, receives responses and events
//! - **Relay (Rust)**: Owns the tab registry, serializes per-tab work
//! - **Browser**: Exposes a DevTools WebSocket, one session per attached tab
//!
//! Key design principles:
//!
//! - The relay is the WebSocket *client* and reconnects on a fixed delay
//! - Only explicitly attached tabs are controllable
//! - Element refs from a snapshot are server-side handles, never guessed
//! - Every failure becomes an error response; nothing is fatal
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use browser_relay::{CdpBrowser, DEFAULT_COMMAND_TIMEOUT, Relay, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (browser, events) =
//!         CdpBrowser::connect("http://127.0.0.1:9222", DEFAULT_COMMAND_TIMEOUT).await?;
//!
//!     let relay = Relay::builder()
//!         .browser(Arc::new(browser), events)
//!         .build()?;
//!
//!     relay.run().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | [`Browser`] abstraction and the CDP implementation |
//! | [`cdp`] | DevTools protocol client (internal) |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`interaction`] | Click, type, scroll, evaluate, screenshot |
//! | [`protocol`] | Relay wire messages |
//! | [`relay`] | Transport, dispatcher, registry, sessions |
//! | [`snapshot`] | Accessibility snapshots with element refs |

// ============================================================================
// Modules
// ============================================================================

/// Browser abstraction.
///
/// - [`Browser`] - Tab and session operations the relay needs
/// - [`CdpBrowser`] - Implementation over a DevTools WebSocket
pub mod browser;

/// DevTools protocol client.
///
/// Internal module handling request correlation and event delivery.
pub mod cdp;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Page interaction commands.
pub mod interaction;

/// Relay wire protocol.
///
/// Inbound commands, responses and out-of-band events.
pub mod protocol;

/// Relay runtime.
///
/// Use [`Relay::builder()`] to create a configured relay.
pub mod relay;

/// Accessibility snapshots.
pub mod snapshot;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{Browser, BrowserEvent, BrowserEvents, CdpBrowser, DetachReason, TabInfo};

// DevTools client
pub use cdp::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{BackendNodeId, RequestId, TabId};

// Protocol types
pub use protocol::{Action, Command, Direction, ElementTarget, RelayEvent, ResponseEnvelope};

// Relay types
pub use relay::{
    ConnectionState, DEFAULT_ENDPOINT, DEFAULT_RECONNECT_DELAY, Relay, RelayBuilder, RelayHandle,
    RelayStatus, TabEntry,
};

// Snapshot types
pub use snapshot::{PageInfo, Snapshot, SnapshotOptions};
