//! [`Browser`] over the DevTools protocol.
//!
//! One browser-level connection carries everything. Each attached tab gets a
//! flattened session from `Target.attachToTarget`; tab-scoped calls are routed
//! by `sessionId`.
//!
//! Relay tab ids are assigned here, in discovery order, and mapped to DevTools
//! target ids. Browser events are translated as follows:
//!
//! | DevTools event | [`BrowserEvent`] |
//! |----------------|------------------|
//! | `Target.targetDestroyed` | `TabClosed` |
//! | `Target.targetInfoChanged` (URL changed) | `TabUpdated` |
//! | `Inspector.detached` | `DebuggerDetached` with the browser's reason |
//! | `Target.detachedFromTarget` (session still bound, tab alive) | `DebuggerDetached` (`detached`) |
//!
//! When the DevTools socket itself closes, every bound session is reported as
//! detached with reason `connection_closed`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::cdp::{CdpConnection, CdpEvent, CdpEvents, DEFAULT_CONNECT_TIMEOUT};
use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TabId, TargetId};

use super::{Browser, BrowserEvent, BrowserEvents, DetachReason, TabInfo};

// ============================================================================
// Constants
// ============================================================================

/// Reason reported for sessions lost with the DevTools socket.
const CONNECTION_CLOSED_REASON: &str = "connection_closed";

/// Reason reported when a session ends without `Inspector.detached`.
const DETACHED_REASON: &str = "detached";

// ============================================================================
// SessionTracker
// ============================================================================

/// Outcome of translating a DevTools event.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Translation {
    /// Forward as-is.
    Emit(BrowserEvent),
    /// Session vanished; report it only if the tab still exists and was
    /// not attached again in the meantime.
    SessionLost {
        tab_id: TabId,
        target_id: TargetId,
        session_id: SessionId,
    },
}

/// Bookkeeping for tab ids, targets and sessions.
#[derive(Debug, Default)]
struct SessionTracker {
    next_tab: u32,
    by_target: FxHashMap<TargetId, TabId>,
    targets: FxHashMap<TabId, TargetId>,
    urls: FxHashMap<TabId, String>,
    sessions: FxHashMap<TabId, SessionId>,
    session_tabs: FxHashMap<SessionId, TabId>,
}

impl SessionTracker {
    /// Returns the tab id for a target, assigning one on first sight.
    fn tab_for_target(&mut self, target_id: &TargetId) -> TabId {
        if let Some(tab_id) = self.by_target.get(target_id) {
            return *tab_id;
        }

        self.next_tab += 1;
        let tab_id = TabId::new(self.next_tab);
        self.by_target.insert(target_id.clone(), tab_id);
        self.targets.insert(tab_id, target_id.clone());
        tab_id
    }

    fn target(&self, tab_id: TabId) -> Option<&TargetId> {
        self.targets.get(&tab_id)
    }

    fn session(&self, tab_id: TabId) -> Option<&SessionId> {
        self.sessions.get(&tab_id)
    }

    fn bind_session(&mut self, tab_id: TabId, session_id: SessionId) {
        self.session_tabs.insert(session_id.clone(), tab_id);
        self.sessions.insert(tab_id, session_id);
    }

    fn unbind_session(&mut self, tab_id: TabId) -> Option<SessionId> {
        let session_id = self.sessions.remove(&tab_id)?;
        self.session_tabs.remove(&session_id);
        Some(session_id)
    }

    fn unbind_by_session(&mut self, session_id: &SessionId) -> Option<TabId> {
        let tab_id = self.session_tabs.remove(session_id)?;
        self.sessions.remove(&tab_id);
        Some(tab_id)
    }

    /// Returns `true` if no session replaced `lost` for this tab.
    fn still_lost(&self, tab_id: TabId, lost: &SessionId) -> bool {
        self.sessions
            .get(&tab_id)
            .is_none_or(|current| current == lost)
    }

    /// Records a page target seen by a query, returning its tab id.
    ///
    /// Only a first URL is stored. Changes are left to
    /// `Target.targetInfoChanged`, which announces them.
    fn register_page(&mut self, info: &Value) -> Option<TabId> {
        let (target_id, url) = page_target(info)?;
        let tab_id = self.tab_for_target(&target_id);
        self.urls.entry(tab_id).or_insert_with(|| url.to_string());
        Some(tab_id)
    }

    /// Records a page target from an event, returning its tab id and whether
    /// the URL changed.
    fn observe_page(&mut self, info: &Value) -> Option<(TabId, bool)> {
        let (target_id, url) = page_target(info)?;
        let tab_id = self.tab_for_target(&target_id);

        let changed = self
            .urls
            .insert(tab_id, url.to_string())
            .is_some_and(|previous| previous != url);

        Some((tab_id, changed))
    }

    /// Forgets a target entirely.
    fn forget_target(&mut self, target_id: &TargetId) -> Option<TabId> {
        let tab_id = self.by_target.remove(target_id)?;
        self.targets.remove(&tab_id);
        self.urls.remove(&tab_id);
        self.unbind_session(tab_id);
        Some(tab_id)
    }

    /// Drops every session, returning the tabs that had one.
    fn drain_sessions(&mut self) -> Vec<TabId> {
        self.session_tabs.clear();
        let mut tabs: Vec<TabId> = self.sessions.drain().map(|(tab_id, _)| tab_id).collect();
        tabs.sort_unstable();
        tabs
    }

    /// Maps a DevTools event onto the relay's view of the browser.
    fn translate(&mut self, event: &CdpEvent) -> Option<Translation> {
        match event.method.as_str() {
            "Target.targetCreated" => {
                self.observe_page(event.params.get("targetInfo")?);
                None
            }

            "Target.targetInfoChanged" => {
                let info = event.params.get("targetInfo")?;
                let (tab_id, changed) = self.observe_page(info)?;
                if !changed {
                    return None;
                }
                let url = info.get("url")?.as_str()?.to_string();
                Some(Translation::Emit(BrowserEvent::TabUpdated { tab_id, url }))
            }

            "Target.targetDestroyed" => {
                let target_id = TargetId::new(event.param_str("targetId")?);
                let tab_id = self.forget_target(&target_id)?;
                Some(Translation::Emit(BrowserEvent::TabClosed { tab_id }))
            }

            "Inspector.detached" => {
                let tab_id = self.unbind_by_session(event.session_id.as_ref()?)?;
                let reason = DetachReason::from_reason(event.param_str("reason").unwrap_or(DETACHED_REASON));
                Some(Translation::Emit(BrowserEvent::DebuggerDetached { tab_id, reason }))
            }

            "Target.detachedFromTarget" => {
                let session_id = SessionId::new(event.param_str("sessionId")?);
                let tab_id = self.unbind_by_session(&session_id)?;
                let target_id = self.target(tab_id)?.clone();
                Some(Translation::SessionLost {
                    tab_id,
                    target_id,
                    session_id,
                })
            }

            _ => None,
        }
    }
}

/// Extracts target id and URL from a page `TargetInfo`.
fn page_target(info: &Value) -> Option<(TargetId, &str)> {
    if info.get("type").and_then(Value::as_str) != Some("page") {
        return None;
    }

    let target_id = TargetId::new(info.get("targetId")?.as_str()?);
    let url = info.get("url").and_then(Value::as_str).unwrap_or_default();
    Some((target_id, url))
}

// ============================================================================
// CdpBrowser
// ============================================================================

/// Browser driven over a DevTools browser-level WebSocket.
#[derive(Clone)]
pub struct CdpBrowser {
    connection: CdpConnection,
    tracker: Arc<Mutex<SessionTracker>>,
}

impl CdpBrowser {
    /// Connects to a DevTools endpoint and starts target discovery.
    ///
    /// `endpoint` is either the browser WebSocket URL
    /// (`ws://127.0.0.1:9222/devtools/browser/<id>`) or the HTTP debugging
    /// address (`http://127.0.0.1:9222`), which is resolved through
    /// `/json/version`.
    ///
    /// # Errors
    ///
    /// Connection and discovery failures.
    pub async fn connect(endpoint: &str, command_timeout: Duration) -> Result<(Self, BrowserEvents)> {
        let ws_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            discover_ws_url(endpoint).await?
        } else {
            endpoint.to_string()
        };

        let (connection, cdp_events) =
            CdpConnection::connect(&ws_url, DEFAULT_CONNECT_TIMEOUT, command_timeout).await?;

        let browser = Self {
            connection,
            tracker: Arc::new(Mutex::new(SessionTracker::default())),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(browser.clone().pump_events(cdp_events, event_tx));

        browser
            .connection
            .send("Target.setDiscoverTargets", json!({ "discover": true }), None)
            .await?;

        info!(url = %ws_url, "Connected to browser");
        Ok((browser, event_rx))
    }

    /// Forwards translated DevTools events until the socket closes.
    async fn pump_events(self, mut cdp_events: CdpEvents, event_tx: mpsc::UnboundedSender<BrowserEvent>) {
        while let Some(event) = cdp_events.recv().await {
            let translation = self.tracker.lock().translate(&event);

            match translation {
                Some(Translation::Emit(browser_event)) => {
                    trace!(method = %event.method, ?browser_event, "Browser event");
                    let _ = event_tx.send(browser_event);
                }

                Some(Translation::SessionLost {
                    tab_id,
                    target_id,
                    session_id,
                }) => {
                    let connection = self.connection.clone();
                    let tracker = Arc::clone(&self.tracker);
                    let event_tx = event_tx.clone();

                    tokio::spawn(async move {
                        let alive = connection
                            .send("Target.getTargetInfo", json!({ "targetId": target_id.as_str() }), None)
                            .await
                            .is_ok();

                        if !alive {
                            return;
                        }

                        if !tracker.lock().still_lost(tab_id, &session_id) {
                            debug!(%tab_id, %session_id, "Tab re-attached before detach was confirmed");
                            return;
                        }

                        debug!(%tab_id, %session_id, "Session detached without inspector notice");
                        let _ = event_tx.send(BrowserEvent::DebuggerDetached {
                            tab_id,
                            reason: DetachReason::Other(DETACHED_REASON.to_string()),
                        });
                    });
                }

                None => {}
            }
        }

        let orphaned = self.tracker.lock().drain_sessions();
        warn!(sessions = orphaned.len(), "DevTools connection closed");

        for tab_id in orphaned {
            let _ = event_tx.send(BrowserEvent::DebuggerDetached {
                tab_id,
                reason: DetachReason::Other(CONNECTION_CLOSED_REASON.to_string()),
            });
        }
    }

    fn target_for(&self, tab_id: TabId) -> Result<TargetId> {
        self.tracker
            .lock()
            .target(tab_id)
            .cloned()
            .ok_or_else(|| Error::tab_not_found(tab_id))
    }

    /// Builds a [`TabInfo`] from a `TargetInfo` object.
    fn tab_info_from(&self, info: &Value) -> Option<TabInfo> {
        let tab_id = self.tracker.lock().register_page(info)?;

        Some(TabInfo {
            tab_id,
            url: info.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
            title: info.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl Browser for CdpBrowser {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let result = self.connection.send("Target.getTargets", Value::Null, None).await?;

        let mut tabs: Vec<TabInfo> = result
            .get("targetInfos")
            .and_then(Value::as_array)
            .map(|infos| infos.iter().filter_map(|info| self.tab_info_from(info)).collect())
            .unwrap_or_default();

        tabs.sort_by_key(|tab| tab.tab_id);
        Ok(tabs)
    }

    async fn tab_info(&self, tab_id: TabId) -> Result<TabInfo> {
        let target_id = self.target_for(tab_id)?;

        let result = self
            .connection
            .send("Target.getTargetInfo", json!({ "targetId": target_id.as_str() }), None)
            .await?;

        result
            .get("targetInfo")
            .and_then(|info| self.tab_info_from(info))
            .ok_or_else(|| Error::tab_not_found(tab_id))
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo> {
        let result = self
            .connection
            .send("Target.createTarget", json!({ "url": url }), None)
            .await?;

        let target_id = result
            .get("targetId")
            .and_then(Value::as_str)
            .map(TargetId::new)
            .ok_or_else(|| Error::protocol("Target.createTarget returned no targetId"))?;

        let tab_id = self.tracker.lock().tab_for_target(&target_id);
        debug!(%tab_id, %target_id, url, "Opened tab");

        self.tab_info(tab_id).await
    }

    async fn close_tab(&self, tab_id: TabId) -> Result<()> {
        let target_id = self.target_for(tab_id)?;

        self.connection
            .send("Target.closeTarget", json!({ "targetId": target_id.as_str() }), None)
            .await?;

        debug!(%tab_id, "Closed tab");
        Ok(())
    }

    async fn attach(&self, tab_id: TabId) -> Result<()> {
        let target_id = self.target_for(tab_id)?;

        if self.tracker.lock().session(tab_id).is_some() {
            return Ok(());
        }

        let result = self
            .connection
            .send(
                "Target.attachToTarget",
                json!({ "targetId": target_id.as_str(), "flatten": true }),
                None,
            )
            .await?;

        let session_id = result
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::new)
            .ok_or_else(|| Error::protocol("Target.attachToTarget returned no sessionId"))?;

        self.tracker.lock().bind_session(tab_id, session_id.clone());

        // Inspector.detached carries the user-facing detach reason.
        if let Err(e) = self
            .connection
            .send("Inspector.enable", Value::Null, Some(&session_id))
            .await
        {
            self.tracker.lock().unbind_session(tab_id);
            let _ = self
                .connection
                .send("Target.detachFromTarget", json!({ "sessionId": session_id.as_str() }), None)
                .await;
            return Err(e);
        }

        debug!(%tab_id, %session_id, "Debugging session opened");
        Ok(())
    }

    async fn detach(&self, tab_id: TabId) -> Result<()> {
        // Unbind first so the resulting detach events are not reported back.
        let Some(session_id) = self.tracker.lock().unbind_session(tab_id) else {
            return Ok(());
        };

        self.connection
            .send("Target.detachFromTarget", json!({ "sessionId": session_id.as_str() }), None)
            .await?;

        debug!(%tab_id, %session_id, "Debugging session closed");
        Ok(())
    }

    async fn send_command(&self, tab_id: TabId, method: &str, params: Value) -> Result<Value> {
        let session_id = self
            .tracker
            .lock()
            .session(tab_id)
            .cloned()
            .ok_or_else(|| Error::tab_not_attached(tab_id))?;

        self.connection.send(method, params, Some(&session_id)).await
    }

    fn shutdown(&self) {
        if self.connection.is_open() {
            debug!("Closing DevTools connection");
            self.connection.shutdown();
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Resolves the browser WebSocket URL from an HTTP debugging address.
///
/// # Errors
///
/// [`Error::Connection`] if the endpoint is unreachable or the answer has no
/// `webSocketDebuggerUrl`.
pub async fn discover_ws_url(http_endpoint: &str) -> Result<String> {
    let version_url = format!("{}/json/version", http_endpoint.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| Error::connection(format!("HTTP client setup failed: {e}")))?;

    let version: Value = client
        .get(&version_url)
        .send()
        .await
        .map_err(|e| Error::connection(format!("Cannot reach DevTools at {version_url}: {e}")))?
        .json()
        .await
        .map_err(|e| Error::connection(format!("Invalid answer from {version_url}: {e}")))?;

    version
        .get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::connection(format!("{version_url} has no webSocketDebuggerUrl")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    use crate::protocol::RelayEvent;
    use crate::relay::{SessionController, TabRegistry};

    const WAIT: Duration = Duration::from_secs(5);

    fn event(method: &str, params: Value, session: Option<&str>) -> CdpEvent {
        CdpEvent {
            method: method.to_string(),
            params,
            session_id: session.map(SessionId::new),
        }
    }

    fn page(target_id: &str, url: &str) -> Value {
        json!({ "targetId": target_id, "type": "page", "url": url, "title": "" })
    }

    #[test]
    fn test_tab_ids_are_stable_per_target() {
        let mut tracker = SessionTracker::default();
        let a = tracker.tab_for_target(&TargetId::new("A"));
        let b = tracker.tab_for_target(&TargetId::new("B"));

        assert_eq!(a, TabId::new(1));
        assert_eq!(b, TabId::new(2));
        assert_eq!(tracker.tab_for_target(&TargetId::new("A")), a);
    }

    #[test]
    fn test_url_change_emits_update() {
        let mut tracker = SessionTracker::default();
        let created = event("Target.targetCreated", json!({ "targetInfo": page("A", "about:blank") }), None);
        assert_eq!(tracker.translate(&created), None);

        let same = event("Target.targetInfoChanged", json!({ "targetInfo": page("A", "about:blank") }), None);
        assert_eq!(tracker.translate(&same), None);

        let moved = event(
            "Target.targetInfoChanged",
            json!({ "targetInfo": page("A", "https://example.com/") }),
            None,
        );
        assert_eq!(
            tracker.translate(&moved),
            Some(Translation::Emit(BrowserEvent::TabUpdated {
                tab_id: TabId::new(1),
                url: "https://example.com/".into(),
            }))
        );
    }

    #[test]
    fn test_non_page_targets_ignored() {
        let mut tracker = SessionTracker::default();
        let worker = event(
            "Target.targetCreated",
            json!({ "targetInfo": { "targetId": "W", "type": "service_worker", "url": "x" } }),
            None,
        );
        assert_eq!(tracker.translate(&worker), None);
        assert!(tracker.by_target.is_empty());
    }

    #[test]
    fn test_target_destroyed_closes_tab_once() {
        let mut tracker = SessionTracker::default();
        let tab_id = tracker.tab_for_target(&TargetId::new("A"));
        tracker.bind_session(tab_id, SessionId::new("S1"));

        let destroyed = event("Target.targetDestroyed", json!({ "targetId": "A" }), None);
        assert_eq!(
            tracker.translate(&destroyed),
            Some(Translation::Emit(BrowserEvent::TabClosed { tab_id }))
        );
        assert_eq!(tracker.translate(&destroyed), None);
        assert!(tracker.session(tab_id).is_none());
    }

    #[test]
    fn test_inspector_detached_carries_reason() {
        let mut tracker = SessionTracker::default();
        let tab_id = tracker.tab_for_target(&TargetId::new("A"));
        tracker.bind_session(tab_id, SessionId::new("S1"));

        let detached = event("Inspector.detached", json!({ "reason": "canceled_by_user" }), Some("S1"));
        assert_eq!(
            tracker.translate(&detached),
            Some(Translation::Emit(BrowserEvent::DebuggerDetached {
                tab_id,
                reason: DetachReason::CanceledByUser,
            }))
        );

        // The follow-up detachedFromTarget finds nothing left to report.
        let follow_up = event("Target.detachedFromTarget", json!({ "sessionId": "S1" }), None);
        assert_eq!(tracker.translate(&follow_up), None);
    }

    #[test]
    fn test_listing_keeps_navigation_announceable() {
        let mut tracker = SessionTracker::default();
        let created = event("Target.targetCreated", json!({ "targetInfo": page("A", "about:blank") }), None);
        tracker.translate(&created);

        let tab_id = tracker
            .register_page(&page("A", "https://example.com/"))
            .expect("page");

        let moved = event(
            "Target.targetInfoChanged",
            json!({ "targetInfo": page("A", "https://example.com/") }),
            None,
        );
        assert_eq!(
            tracker.translate(&moved),
            Some(Translation::Emit(BrowserEvent::TabUpdated {
                tab_id,
                url: "https://example.com/".into(),
            }))
        );
    }

    #[test]
    fn test_bare_detach_needs_verification() {
        let mut tracker = SessionTracker::default();
        let tab_id = tracker.tab_for_target(&TargetId::new("A"));
        tracker.bind_session(tab_id, SessionId::new("S1"));

        let detached = event("Target.detachedFromTarget", json!({ "sessionId": "S1" }), None);
        assert_eq!(
            tracker.translate(&detached),
            Some(Translation::SessionLost {
                tab_id,
                target_id: TargetId::new("A"),
                session_id: SessionId::new("S1"),
            })
        );
        assert!(tracker.still_lost(tab_id, &SessionId::new("S1")));

        tracker.bind_session(tab_id, SessionId::new("S2"));
        assert!(!tracker.still_lost(tab_id, &SessionId::new("S1")));
    }

    #[test]
    fn test_relay_initiated_detach_is_silent() {
        let mut tracker = SessionTracker::default();
        let tab_id = tracker.tab_for_target(&TargetId::new("A"));
        tracker.bind_session(tab_id, SessionId::new("S1"));
        tracker.unbind_session(tab_id);

        let detached = event("Inspector.detached", json!({ "reason": "canceled_by_user" }), Some("S1"));
        assert_eq!(tracker.translate(&detached), None);
    }

    #[test]
    fn test_drain_sessions() {
        let mut tracker = SessionTracker::default();
        let a = tracker.tab_for_target(&TargetId::new("A"));
        let b = tracker.tab_for_target(&TargetId::new("B"));
        tracker.bind_session(b, SessionId::new("S2"));
        tracker.bind_session(a, SessionId::new("S1"));

        assert_eq!(tracker.drain_sessions(), vec![a, b]);
        assert!(tracker.session_tabs.is_empty());
    }

    // ------------------------------------------------------------------------
    // Over a loopback DevTools endpoint
    // ------------------------------------------------------------------------

    /// Serves one page target `A`. `getTargetInfo` answers are held back by
    /// `target_info_delay`; frames sent on the returned channel are pushed to
    /// the client as events.
    async fn spawn_devtools(target_info_delay: Duration) -> (String, mpsc::UnboundedSender<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
        let push = out_tx.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (mut write, mut read) = accept_async(stream).await.expect("handshake").split();

            tokio::spawn(async move {
                while let Some(frame) = out_rx.recv().await {
                    if write.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
            });

            let mut sessions = 0;
            while let Some(Ok(Message::Text(text))) = read.next().await {
                let request: Value = serde_json::from_str(&text).expect("json request");
                let method = request["method"].as_str().unwrap_or_default();

                let result = match method {
                    "Target.getTargets" => json!({ "targetInfos": [page("A", "https://a.test/")] }),
                    "Target.getTargetInfo" => json!({ "targetInfo": page("A", "https://a.test/") }),
                    "Target.attachToTarget" => {
                        sessions += 1;
                        json!({ "sessionId": format!("S{sessions}") })
                    }
                    _ => json!({}),
                };
                let response = json!({ "id": request["id"], "result": result });

                if method == "Target.getTargetInfo" && !target_info_delay.is_zero() {
                    let out_tx = out_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(target_info_delay).await;
                        let _ = out_tx.send(response);
                    });
                } else {
                    let _ = out_tx.send(response);
                }
            }
        });

        (format!("ws://127.0.0.1:{port}"), push)
    }

    fn detached_from(session_id: &str) -> Value {
        json!({
            "method": "Target.detachedFromTarget",
            "params": { "sessionId": session_id, "targetId": "A" }
        })
    }

    #[tokio::test]
    async fn test_lost_session_is_announced() {
        let (url, push) = spawn_devtools(Duration::ZERO).await;
        let (browser, mut events) = CdpBrowser::connect(&url, Duration::from_secs(5))
            .await
            .expect("connect");

        let registry = TabRegistry::shared();
        let controller = SessionController::new(Arc::new(browser.clone()), Arc::clone(&registry));

        let tab_id = browser.list_tabs().await.expect("tabs")[0].tab_id;
        controller.attach(tab_id).await.expect("attach");
        assert_eq!(registry.lock().len(), 1);

        push.send(detached_from("S1")).expect("push");

        let event = timeout(WAIT, events.recv())
            .await
            .expect("event in time")
            .expect("event");
        assert_eq!(
            event,
            BrowserEvent::DebuggerDetached {
                tab_id,
                reason: DetachReason::Other("detached".into()),
            }
        );

        assert_eq!(
            controller.handle_browser_event(event),
            Some(RelayEvent::DebuggerDetached {
                tab_id,
                reason: "detached".into(),
            })
        );
        assert!(registry.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reattach_cancels_lost_session_report() {
        let (url, push) = spawn_devtools(Duration::from_millis(300)).await;
        let (browser, mut events) = CdpBrowser::connect(&url, Duration::from_secs(5))
            .await
            .expect("connect");

        let tab_id = browser.list_tabs().await.expect("tabs")[0].tab_id;
        browser.attach(tab_id).await.expect("attach");

        push.send(detached_from("S1")).expect("push");

        timeout(WAIT, async {
            while browser.tracker.lock().session(tab_id).is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session unbound");

        browser.attach(tab_id).await.expect("attach again");

        let late = timeout(Duration::from_millis(800), events.recv()).await;
        assert!(late.is_err(), "stale detach was reported");
        assert_eq!(
            browser.tracker.lock().session(tab_id),
            Some(&SessionId::new("S2"))
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_devtools_socket() {
        let (url, _push) = spawn_devtools(Duration::ZERO).await;
        let (browser, mut events) = CdpBrowser::connect(&url, Duration::from_secs(5))
            .await
            .expect("connect");

        assert!(browser.connection.is_open());
        Browser::shutdown(&browser);

        let ended = timeout(WAIT, events.recv()).await.expect("stream ends in time");
        assert!(ended.is_none());
        assert!(!browser.connection.is_open());
    }
}
