//! DevTools WebSocket connection and event loop.
//!
//! The connection spawns a tokio task that handles:
//!
//! - Outgoing calls from [`CdpConnection::send`]
//! - Incoming responses, correlated by [`CommandId`]
//! - Incoming events, forwarded to the receiver returned by
//!   [`CdpConnection::connect`]
//!
//! Every call carries a timeout. When the socket closes, pending calls fail
//! with [`Error::ConnectionClosed`] and the event receiver yields `None`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};

use super::message::{CdpEvent, CdpMessage, CdpRequest, CdpResponse};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a single protocol call.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum in-flight calls before new ones are rejected.
const MAX_PENDING_REQUESTS: usize = 256;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Map of call ids to response channels.
type CorrelationMap = FxHashMap<CommandId, oneshot::Sender<Result<CdpResponse>>>;

/// Receiver for events pushed by the browser.
pub type CdpEvents = mpsc::UnboundedReceiver<CdpEvent>;

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: CdpRequest,
        response_tx: oneshot::Sender<Result<CdpResponse>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(CommandId),
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// CdpConnection
// ============================================================================

/// Connection to a browser's DevTools endpoint.
///
/// Cheap to clone; all clones share one socket and event loop.
#[derive(Clone)]
pub struct CdpConnection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Timeout applied by [`send`](Self::send).
    command_timeout: Duration,
}

impl CdpConnection {
    /// Connects to a DevTools WebSocket URL.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds `connect_timeout`
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(
        ws_url: &str,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<(Self, CdpEvents)> {
        debug!(url = %ws_url, "Connecting to DevTools endpoint");

        let (ws_stream, _) = timeout(connect_timeout, connect_async(ws_url))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))?
            .map_err(Error::WebSocket)?;

        debug!(url = %ws_url, "DevTools connection established");

        Ok(Self::from_stream(ws_stream, command_timeout))
    }

    /// Wraps an established stream and spawns the event loop.
    fn from_stream(ws_stream: WsStream, command_timeout: Duration) -> (Self, CdpEvents) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            event_tx,
        ));

        let connection = Self {
            command_tx,
            correlation,
            command_timeout,
        };

        (connection, event_rx)
    }

    /// Calls a method with the default timeout and returns its result.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the browser answers with an error
    /// - [`Error::RequestTimeout`] if no answer arrives in time
    /// - [`Error::ConnectionClosed`] if the socket is gone
    pub async fn send(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&SessionId>,
    ) -> Result<Value> {
        self.send_with_timeout(method, params, session_id, self.command_timeout)
            .await
    }

    /// Calls a method with a custom timeout.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&SessionId>,
        request_timeout: Duration,
    ) -> Result<Value> {
        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending DevTools calls"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let request = CdpRequest::new(method, params, session_id.cloned());
        let request_id = request.id;
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result?.into_result(),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    method,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` while the event loop is running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Closes the socket.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        event_tx: mpsc::UnboundedSender<CdpEvent>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &event_tx);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("DevTools socket closed by browser");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "DevTools socket error");
                            break;
                        }

                        None => {
                            debug!("DevTools stream ended");
                            break;
                        }

                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(%request_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("DevTools shutdown requested");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Closing the receiver wakes every pending caller.
        command_rx.close();
        Self::fail_pending_requests(&correlation);

        debug!("DevTools event loop terminated");
    }

    /// Routes an incoming text frame.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        event_tx: &mpsc::UnboundedSender<CdpEvent>,
    ) {
        match from_str::<CdpMessage>(text) {
            Ok(CdpMessage::Response(response)) => {
                let tx = correlation.lock().remove(&response.id);

                if let Some(tx) = tx {
                    let _ = tx.send(Ok(response));
                } else {
                    warn!(id = %response.id, "Response for unknown DevTools call");
                }
            }

            Ok(CdpMessage::Event(event)) => {
                trace!(method = %event.method, "DevTools event");
                let _ = event_tx.send(event);
            }

            Err(e) => {
                warn!(error = %e, "Failed to parse DevTools message");
            }
        }
    }

    /// Serializes and writes a request.
    async fn handle_send_command(
        request: CdpRequest,
        response_tx: oneshot::Sender<Result<CdpResponse>>,
        ws_write: &mut SplitSink<WsStream, Message>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await
            && let Some(tx) = correlation.lock().remove(&request_id)
        {
            let _ = tx.send(Err(Error::WebSocket(e)));
        }

        trace!(%request_id, method = %request.method, "DevTools call sent");
    }

    /// Fails all pending calls with [`Error::ConnectionClosed`].
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending DevTools calls on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
