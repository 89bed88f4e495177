//! Relay runtime.
//!
//! Wires the desktop-app transport, the command dispatcher and the browser's
//! event stream into one event loop.
//!
//! # Architecture
//!
//! ```text
//!   desktop app ◄──ws──► Transport ──TransportEvent──┐
//!                            ▲                       ▼
//!                            │                    Relay::run ──► Dispatcher ──► Browser
//!                            │                       ▲                            │
//!                            └─────RelayEvent────────┴──────BrowserEvent──────────┘
//! ```
//!
//! Each inbound command runs on its own task. Commands for the same tab are
//! serialized by the dispatcher; everything else runs concurrently. A response
//! is sent only if the connection it arrived on is still open.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`RelayBuilder`] configuration |
//! | `dispatcher` | Command routing and per-tab locks |
//! | `registry` | Attached-tab registry and element refs |
//! | `session` | Debugging-session lifecycle |
//! | `transport` | Reconnecting desktop-app WebSocket |

// ============================================================================
// Submodules
// ============================================================================

/// Relay configuration builder.
pub mod builder;

/// Command dispatcher.
pub mod dispatcher;

/// Attached-tab registry.
pub mod registry;

/// Session lifecycle.
pub mod session;

/// Desktop-app transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{DEFAULT_ENDPOINT, RelayBuilder};
pub use dispatcher::{Dispatcher, TabLocks};
pub use registry::{RefTable, SharedRegistry, TabEntry, TabRegistry};
pub use session::{REQUIRED_DOMAINS, SessionController, ensure_attached};
pub use transport::{
    ConnectionState, DEFAULT_RECONNECT_DELAY, StatusObserver, Transport, TransportEvent,
};

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::browser::BrowserEvents;
use crate::error::Result;
use crate::protocol::RelayEvent;

// ============================================================================
// Relay
// ============================================================================

/// A configured relay, ready to run.
///
/// Use [`Relay::builder()`] to create one.
pub struct Relay {
    pub(crate) transport: Transport,
    pub(crate) transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    pub(crate) browser_events: BrowserEvents,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) registry: SharedRegistry,
    pub(crate) shutdown_tx: Arc<watch::Sender<bool>>,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("endpoint", &self.transport.endpoint())
            .field("state", &self.transport.state())
            .field("tabs", &self.registry.lock().len())
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Creates a new relay builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }

    /// Returns a handle for status queries and shutdown.
    #[must_use]
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            transport: self.transport.clone(),
            registry: Arc::clone(&self.registry),
            shutdown: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Connects and serves until [`RelayHandle::shutdown`] is called.
    ///
    /// Connection loss is not an error: the transport reconnects on its own
    /// and the loop keeps running. On exit the browser connection is released
    /// through [`Browser::shutdown`](crate::Browser::shutdown).
    ///
    /// # Errors
    ///
    /// Currently infallible; the signature leaves room for startup failures.
    pub async fn run(self) -> Result<()> {
        let Self {
            transport,
            mut transport_events,
            mut browser_events,
            dispatcher,
            registry,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;

        info!(endpoint = %transport.endpoint(), "Relay starting");
        transport.connect();

        let mut browser_open = true;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                event = transport_events.recv() => {
                    let Some(event) = event else { break };

                    match event {
                        TransportEvent::Opened { generation } => {
                            let ready = RelayEvent::RelayReady {
                                attached_tabs: registry.lock().entries(),
                            };
                            transport.send_on(generation, &ready);
                        }

                        TransportEvent::Message { generation, text } => {
                            let dispatcher = dispatcher.clone();
                            let transport = transport.clone();

                            tokio::spawn(async move {
                                let Some(response) = dispatcher.handle_text(&text).await else {
                                    return;
                                };
                                if !transport.send_on(generation, &response) {
                                    debug!(
                                        request_id = %response.request_id(),
                                        "Response dropped, connection gone"
                                    );
                                }
                            });
                        }

                        TransportEvent::Closed { generation } => {
                            debug!(generation, "Desktop app connection closed");
                        }
                    }
                }

                event = browser_events.recv(), if browser_open => {
                    match event {
                        Some(event) => {
                            if let Some(relay_event) = dispatcher.sessions().handle_browser_event(event) {
                                debug!(kind = relay_event.kind(), "Announcing browser change");
                                transport.send(&relay_event);
                            }
                        }

                        None => {
                            warn!("Browser event stream ended");
                            browser_open = false;
                        }
                    }
                }
            }
        }

        transport.shutdown();
        dispatcher.browser().shutdown();
        info!("Relay stopped");
        Ok(())
    }
}

// ============================================================================
// RelayHandle
// ============================================================================

/// Read-only status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    /// Desktop-app connection state.
    pub connection: ConnectionState,
    /// Registry contents, ordered by tab id.
    pub tabs: Vec<TabEntry>,
}

/// Cloneable control handle for a running relay.
#[derive(Clone)]
pub struct RelayHandle {
    transport: Transport,
    registry: SharedRegistry,
    shutdown: Arc<watch::Sender<bool>>,
}

impl fmt::Debug for RelayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayHandle")
            .field("state", &self.transport.state())
            .finish_non_exhaustive()
    }
}

impl RelayHandle {
    /// Returns connection state and attached tabs.
    #[must_use]
    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            connection: self.transport.state(),
            tabs: self
                .registry
                .lock()
                .entries()
                .into_iter()
                .map(|(_, entry)| entry)
                .collect(),
        }
    }

    /// Asks for an immediate reconnect if disconnected.
    #[inline]
    pub fn request_reconnect(&self) {
        self.transport.request_reconnect();
    }

    /// Stops the relay loop and closes the connection.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.transport.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================
