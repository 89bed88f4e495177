//! Relay wire protocol.
//!
//! JSON messages exchanged with the desktop application over the relay
//! socket. Field names are part of the contract.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`CommandEnvelope`] | App → Relay | Command request |
//! | [`ResponseEnvelope`] | Relay → App | Exactly one per command |
//! | [`RelayEvent`] | Relay → App | Ready announcement and out-of-band events |
//!
//! # Actions
//!
//! `ping`, `list_tabs`, `open`, `close`, `attach`, `detach`, `snapshot`,
//! `evaluate`, `click`, `type`, `scroll`, `screenshot`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Inbound envelope and the typed [`Command`] it decodes into |
//! | `event` | Unsolicited outbound messages |
//! | `response` | Response envelopes |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound command envelopes and typed commands.
pub mod command;

/// Unsolicited outbound messages.
pub mod event;

/// Response envelopes.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Action, Command, CommandEnvelope, DecodeFailure, Direction, ElementTarget};
pub use event::RelayEvent;
pub use response::ResponseEnvelope;
