//! Builder pattern for relay configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use browser_relay::{CdpBrowser, DEFAULT_COMMAND_TIMEOUT, Relay};
//!
//! # async fn example() -> browser_relay::Result<()> {
//! let (browser, events) =
//!     CdpBrowser::connect("http://127.0.0.1:9222", DEFAULT_COMMAND_TIMEOUT).await?;
//!
//! let relay = Relay::builder()
//!     .endpoint("ws://127.0.0.1:19988/relay")
//!     .browser(Arc::new(browser), events)
//!     .build()?;
//!
//! relay.run().await
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use url::Url;

use crate::browser::{Browser, BrowserEvents};
use crate::error::{Error, Result};
use crate::snapshot::SnapshotOptions;

use super::Relay;
use super::dispatcher::Dispatcher;
use super::registry::TabRegistry;
use super::transport::{ConnectionState, DEFAULT_RECONNECT_DELAY, StatusObserver, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Desktop-app endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:19988/relay";

// ============================================================================
// RelayBuilder
// ============================================================================

/// Builder for a [`Relay`].
///
/// Use [`Relay::builder()`] to create one.
pub struct RelayBuilder {
    /// Desktop-app WebSocket URL.
    endpoint: String,
    /// Browser backend and its event stream.
    browser: Option<(Arc<dyn Browser>, BrowserEvents)>,
    /// Delay between reconnect attempts.
    reconnect_delay: Duration,
    /// Snapshot tuning.
    snapshot: SnapshotOptions,
    /// Connection state callback.
    on_status: Option<StatusObserver>,
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            browser: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            snapshot: SnapshotOptions::default(),
            on_status: None,
        }
    }
}

impl fmt::Debug for RelayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBuilder")
            .field("endpoint", &self.endpoint)
            .field("browser", &self.browser.is_some())
            .field("reconnect_delay", &self.reconnect_delay)
            .field("snapshot", &self.snapshot)
            .field("on_status", &self.on_status.is_some())
            .finish()
    }
}

// ============================================================================
// RelayBuilder Implementation
// ============================================================================

impl RelayBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the desktop-app WebSocket URL.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Sets the browser backend.
    ///
    /// `events` must be the stream produced alongside `browser`.
    #[inline]
    #[must_use]
    pub fn browser<B>(mut self, browser: Arc<B>, events: BrowserEvents) -> Self
    where
        B: Browser + 'static,
    {
        let browser: Arc<dyn Browser> = browser;
        self.browser = Some((browser, events));
        self
    }

    /// Sets the delay before each reconnect attempt.
    #[inline]
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets snapshot tuning.
    #[inline]
    #[must_use]
    pub fn snapshot_options(mut self, options: SnapshotOptions) -> Self {
        self.snapshot = options;
        self
    }

    /// Registers a callback fired on every connection state change.
    #[must_use]
    pub fn on_status<F>(mut self, callback: F) -> Self
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.on_status = Some(Arc::new(callback));
        self
    }

    /// Builds the relay.
    ///
    /// Nothing connects until [`Relay::run`] is awaited.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no browser was set
    /// - [`Error::Config`] if the endpoint is not a `ws://` or `wss://` URL
    pub fn build(self) -> Result<Relay> {
        self.validate_endpoint()?;
        self.validate_reconnect_delay()?;

        let (browser, browser_events) = self
            .browser
            .ok_or_else(|| Error::config("Browser backend is required. Use .browser()"))?;

        let registry = TabRegistry::shared();
        let dispatcher = Dispatcher::new(browser, registry.clone(), self.snapshot);
        let (transport, transport_events) =
            Transport::new(self.endpoint, self.reconnect_delay, self.on_status);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Relay {
            transport,
            transport_events,
            browser_events,
            dispatcher,
            registry,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    fn validate_endpoint(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::config(format!("Invalid endpoint '{}': {e}", self.endpoint)))?;

        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(Error::config(format!(
                "Endpoint must use ws:// or wss://, got '{other}://'"
            ))),
        }
    }

    fn validate_reconnect_delay(&self) -> Result<()> {
        if self.reconnect_delay.is_zero() {
            return Err(Error::config("Reconnect delay must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
