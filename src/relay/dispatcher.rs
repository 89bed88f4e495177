//! Command dispatcher.
//!
//! The dispatcher is the single boundary between the wire and the handlers.
//! Whatever happens inside a handler (an error, a protocol failure deep in a
//! call chain, even a panic) exactly one [`ResponseEnvelope`] comes out,
//! carrying the command's `requestId`.
//!
//! Commands for the same tab run one at a time, though not necessarily in
//! arrival order: each command is spawned before it takes the tab lock.
//! Commands for different tabs run concurrently.

// ============================================================================
// Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use crate::browser::Browser;
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::interaction::Executor;
use crate::protocol::{Command, CommandEnvelope, DecodeFailure, ResponseEnvelope};
use crate::snapshot::{SnapshotBuilder, SnapshotOptions};

use super::registry::SharedRegistry;
use super::session::SessionController;

// ============================================================================
// TabLocks
// ============================================================================

/// Per-tab command serialization.
#[derive(Debug, Clone, Default)]
pub struct TabLocks {
    locks: Arc<Mutex<FxHashMap<TabId, Arc<AsyncMutex<()>>>>>,
}

impl TabLocks {
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of a tab.
    pub async fn acquire(&self, tab_id: TabId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.lock().entry(tab_id).or_default());
        lock.lock_owned().await
    }

    /// Drops locks nobody holds or waits for.
    pub fn prune(&self) {
        self.locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Returns the number of tracked tabs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns `true` if no tab is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes commands to handlers.
#[derive(Clone)]
pub struct Dispatcher {
    browser: Arc<dyn Browser>,
    registry: SharedRegistry,
    sessions: SessionController,
    snapshots: SnapshotBuilder,
    executor: Executor,
    locks: TabLocks,
}

impl Dispatcher {
    /// Creates a dispatcher over a browser and registry.
    #[must_use]
    pub fn new(browser: Arc<dyn Browser>, registry: SharedRegistry, options: SnapshotOptions) -> Self {
        Self {
            sessions: SessionController::new(Arc::clone(&browser), Arc::clone(&registry)),
            snapshots: SnapshotBuilder::new(Arc::clone(&browser), Arc::clone(&registry), options),
            executor: Executor::new(Arc::clone(&browser), Arc::clone(&registry)),
            locks: TabLocks::new(),
            browser,
            registry,
        }
    }

    /// Returns the browser commands run against.
    #[inline]
    #[must_use]
    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    /// Returns the session controller.
    #[inline]
    #[must_use]
    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    /// Handles a raw text frame.
    ///
    /// Returns `None` only when the frame cannot be correlated (not JSON, or
    /// no `requestId`); such frames are logged and dropped.
    pub async fn handle_text(&self, text: &str) -> Option<ResponseEnvelope> {
        match CommandEnvelope::decode(text) {
            Ok(envelope) => Some(self.handle(envelope).await),

            Err(DecodeFailure {
                request_id: Some(request_id),
                error,
            }) => {
                warn!(%request_id, error = %error, "Malformed command");
                Some(ResponseEnvelope::failure(request_id, &error))
            }

            Err(DecodeFailure {
                request_id: None,
                error,
            }) => {
                warn!(error = %error, "Dropping message without requestId");
                None
            }
        }
    }

    /// Handles one command, always producing exactly one response.
    pub async fn handle(&self, envelope: CommandEnvelope) -> ResponseEnvelope {
        let request_id = envelope.request_id.clone();

        let outcome = AssertUnwindSafe(self.execute(&envelope))
            .catch_unwind()
            .await;

        self.locks.prune();

        match outcome {
            Ok(Ok(result)) => {
                debug!(%request_id, action = %envelope.action, "Command succeeded");
                ResponseEnvelope::success(request_id, result)
            }

            Ok(Err(e)) => {
                debug!(%request_id, action = %envelope.action, error = %e, "Command failed");
                ResponseEnvelope::failure(request_id, &e)
            }

            Err(_) => {
                error!(%request_id, action = %envelope.action, "Command handler panicked");
                ResponseEnvelope::failure(request_id, &Error::handler_panicked(&envelope.action))
            }
        }
    }

    async fn execute(&self, envelope: &CommandEnvelope) -> Result<Value> {
        let command = Command::from_envelope(envelope)?;

        let _guard = match command.tab_id() {
            Some(tab_id) => Some(self.locks.acquire(tab_id).await),
            None => None,
        };

        self.run(command).await
    }

    async fn run(&self, command: Command) -> Result<Value> {
        match command {
            Command::Ping => Ok(json!({ "pong": true })),

            Command::ListTabs => self.list_tabs().await,

            Command::Open { url } => {
                let tab = self.browser.open_tab(&url).await?;
                Ok(json!({ "success": true, "tabId": tab.tab_id, "url": tab.url }))
            }

            Command::Close { tab_id } => self.sessions.close(tab_id).await,

            Command::Attach { tab_id } => self.sessions.attach(tab_id).await,

            Command::Detach { tab_id } => self.sessions.detach(tab_id).await,

            Command::Snapshot { tab_id } => {
                let snapshot = self.snapshots.capture(tab_id).await?;
                Ok(serde_json::to_value(snapshot)?)
            }

            Command::Evaluate { tab_id, expression } => {
                self.executor.evaluate(tab_id, &expression).await
            }

            Command::Click { tab_id, target } => self.executor.click(tab_id, &target).await,

            Command::Type {
                tab_id,
                target,
                text,
            } => self.executor.type_text(tab_id, &target, &text).await,

            Command::Scroll { tab_id, direction } => self.executor.scroll(tab_id, direction).await,

            Command::Screenshot { tab_id } => self.executor.screenshot(tab_id).await,
        }
    }

    async fn list_tabs(&self) -> Result<Value> {
        let tabs = self.browser.list_tabs().await?;

        let tabs: Vec<Value> = {
            let registry = self.registry.lock();
            tabs.into_iter()
                .map(|tab| {
                    json!({
                        "tabId": tab.tab_id,
                        "url": tab.url,
                        "title": tab.title,
                        "attached": registry.is_attached(tab.tab_id),
                    })
                })
                .collect()
        };

        Ok(json!({ "tabs": tabs }))
    }
}

// ============================================================================
// Tests
// ============================================================================
