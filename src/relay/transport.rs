//! Transport manager.
//!
//! Owns the single outbound WebSocket to the desktop application.
//!
//! ```text
//!              connect()                 socket open
//! Disconnected ─────────► Connecting ─────────────────► Connected
//!      ▲                      │                             │
//!      │      failed          │           closed            │
//!      └──────────────────────┴─────────────────────────────┘
//!                    schedule_reconnect() (fixed delay)
//! ```
//!
//! Every successful open bumps a generation counter. Inbound frames are
//! tagged with the generation they arrived on and [`Transport::send_on`]
//! refuses to write into a newer connection, so a response to a request from
//! a dropped connection is never delivered on its successor.
//!
//! Outbound messages are never queued: anything sent while not connected is
//! dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

// ============================================================================
// Constants
// ============================================================================

/// Fixed delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

// ============================================================================
// ConnectionState
// ============================================================================

/// State of the desktop-app connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket and no attempt in flight.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Socket open.
    Connected,
}

impl ConnectionState {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked on every state transition.
pub type StatusObserver = Arc<dyn Fn(ConnectionState) + Send + Sync>;

// ============================================================================
// TransportEvent
// ============================================================================

/// What the transport reports upwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket opened.
    Opened {
        /// Connection generation.
        generation: u64,
    },
    /// Text frame received.
    Message {
        /// Generation the frame arrived on.
        generation: u64,
        /// Frame payload.
        text: String,
    },
    /// Socket closed.
    Closed {
        /// Generation that closed.
        generation: u64,
    },
}

// ============================================================================
// Transport
// ============================================================================

struct TransportInner {
    endpoint: String,
    reconnect_delay: Duration,
    state: RwLock<ConnectionState>,
    generation: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    retry: Mutex<Option<JoinHandle<()>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    observer: Option<StatusObserver>,
    stopped: AtomicBool,
}

/// Reconnecting WebSocket client.
///
/// Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

impl Transport {
    /// Creates a disconnected transport.
    ///
    /// Nothing happens until [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        reconnect_delay: Duration,
        observer: Option<StatusObserver>,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();

        let transport = Self {
            inner: Arc::new(TransportInner {
                endpoint: endpoint.into(),
                reconnect_delay,
                state: RwLock::new(ConnectionState::Disconnected),
                generation: AtomicU64::new(0),
                outbound: Mutex::new(None),
                retry: Mutex::new(None),
                events,
                observer,
                stopped: AtomicBool::new(false),
            }),
        };

        (transport, events_rx)
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Returns the generation of the latest opened connection.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Starts a connection attempt.
    ///
    /// No-op while connected, while an attempt is in flight, or after
    /// [`shutdown`](Self::shutdown).
    pub fn connect(&self) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }

        if !self.transition_from(ConnectionState::Disconnected, ConnectionState::Connecting) {
            trace!(state = %self.state(), "connect() ignored");
            return;
        }

        tokio::spawn(self.clone().run_connection());
    }

    /// Arms the reconnect timer.
    ///
    /// At most one timer is pending; further calls are no-ops until it fires.
    pub fn schedule_reconnect(&self) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut retry = self.inner.retry.lock();
        if retry.is_some() {
            return;
        }

        let transport = self.clone();
        let delay = self.inner.reconnect_delay;
        debug!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");

        *retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            transport.inner.retry.lock().take();
            transport.connect();
        }));
    }

    /// Connects now if disconnected; otherwise does nothing.
    pub fn request_reconnect(&self) {
        if self.state() != ConnectionState::Disconnected {
            return;
        }
        self.cancel_retry();
        self.connect();
    }

    /// Sends a message on the current connection.
    ///
    /// Returns `false` if the message was dropped.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        self.send_on(self.generation(), message)
    }

    /// Sends a message only if connection `generation` is still the open one.
    ///
    /// Returns `false` if the message was dropped.
    pub fn send_on<T: Serialize>(&self, generation: u64, message: &T) -> bool {
        if self.state() != ConnectionState::Connected || self.generation() != generation {
            trace!(generation, "Dropping message, connection not current");
            return false;
        }

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound message");
                return false;
            }
        };

        match self.inner.outbound.lock().as_ref() {
            Some(tx) => tx.send(Message::Text(text.into())).is_ok(),
            None => false,
        }
    }

    /// Closes the connection and stops reconnecting.
    pub fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.cancel_retry();

        // Dropping the sender ends the connection loop.
        self.inner.outbound.lock().take();
        self.set_state(ConnectionState::Disconnected);

        debug!("Transport shut down");
    }

    fn cancel_retry(&self) {
        if let Some(handle) = self.inner.retry.lock().take() {
            handle.abort();
        }
    }

    /// One connection, from handshake to close.
    async fn run_connection(self) {
        let ws_stream = match connect_async(self.inner.endpoint.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                debug!(endpoint = %self.inner.endpoint, error = %e, "Connect failed");
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
                return;
            }
        };

        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.inner.outbound.lock() = Some(out_tx);

        self.cancel_retry();
        self.set_state(ConnectionState::Connected);
        info!(endpoint = %self.inner.endpoint, generation, "Connected");

        let _ = self.inner.events.send(TransportEvent::Opened { generation });

        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let _ = self.inner.events.send(TransportEvent::Message {
                                generation,
                                text: text.as_str().to_owned(),
                            });
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            debug!(generation, "Socket closed by peer");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(generation, error = %e, "Socket error");
                            break;
                        }

                        _ => {}
                    }
                }

                outbound = out_rx.recv() => {
                    match outbound {
                        Some(message) => {
                            if let Err(e) = ws_write.send(message).await {
                                warn!(generation, error = %e, "Socket write failed");
                                break;
                            }
                        }

                        None => {
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        // A newer connection may already own the state.
        if self.generation() != generation {
            return;
        }

        self.inner.outbound.lock().take();
        self.set_state(ConnectionState::Disconnected);
        info!(generation, "Disconnected");

        let _ = self.inner.events.send(TransportEvent::Closed { generation });
        self.schedule_reconnect();
    }

    /// Moves `from` → `to` atomically; returns whether it happened.
    fn transition_from(&self, from: ConnectionState, to: ConnectionState) -> bool {
        {
            let mut state = self.inner.state.write();
            if *state != from {
                return false;
            }
            *state = to;
        }
        self.notify(to);
        true
    }

    fn set_state(&self, to: ConnectionState) {
        let changed = {
            let mut state = self.inner.state.write();
            let changed = *state != to;
            *state = to;
            changed
        };
        if changed {
            self.notify(to);
        }
    }

    fn notify(&self, state: ConnectionState) {
        trace!(%state, "Connection state changed");
        if let Some(observer) = &self.inner.observer {
            observer(state);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
