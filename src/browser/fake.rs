//! In-memory [`Browser`] for handler tests.
//!
//! Tabs live in a map, sessions in a set, and protocol calls are answered by
//! per-method responders. Every call is recorded so tests can assert on the
//! exact protocol traffic.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::identifiers::TabId;

use super::{Browser, BrowserEvent, BrowserEvents, DetachReason, TabInfo};

type Responder = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

#[derive(Default)]
struct FakeState {
    next_tab: u32,
    tabs: BTreeMap<TabId, TabInfo>,
    sessions: FxHashSet<TabId>,
    attach_calls: usize,
    attach_failure: Option<String>,
    detach_failure: Option<String>,
    responders: FxHashMap<String, Responder>,
    delays: FxHashMap<String, Duration>,
    calls: Vec<(TabId, String, Value)>,
    shutdowns: usize,
}

/// Scriptable browser double.
pub(crate) struct FakeBrowser {
    state: Mutex<FakeState>,
    events: mpsc::UnboundedSender<BrowserEvent>,
}

impl FakeBrowser {
    pub(crate) fn new() -> (Arc<Self>, BrowserEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let browser = Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            events,
        });
        (browser, rx)
    }

    /// Adds a tab with a fixed id.
    pub(crate) fn add_tab(&self, tab_id: u32, url: &str) -> TabId {
        let tab_id = TabId::new(tab_id);
        let mut state = self.state.lock();
        state.next_tab = state.next_tab.max(tab_id.as_u32());
        state.tabs.insert(
            tab_id,
            TabInfo {
                tab_id,
                url: url.to_string(),
                title: format!("Tab {tab_id}"),
            },
        );
        tab_id
    }

    /// Answers `method` with the result of `responder`.
    pub(crate) fn respond<F>(&self, method: &str, responder: F)
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .responders
            .insert(method.to_string(), Box::new(responder));
    }

    /// Answers `method` with a protocol error.
    pub(crate) fn fail(&self, method: &str, message: &str) {
        let message = message.to_string();
        self.respond(method, move |_| Err(Error::protocol(message.clone())));
    }

    /// Holds every answer to `method` back for `delay`.
    pub(crate) fn delay(&self, method: &str, delay: Duration) {
        self.state.lock().delays.insert(method.to_string(), delay);
    }

    pub(crate) fn fail_attach(&self, message: &str) {
        self.state.lock().attach_failure = Some(message.to_string());
    }

    pub(crate) fn fail_detach(&self, message: &str) {
        self.state.lock().detach_failure = Some(message.to_string());
    }

    pub(crate) fn attach_calls(&self) -> usize {
        self.state.lock().attach_calls
    }

    pub(crate) fn has_session(&self, tab_id: TabId) -> bool {
        self.state.lock().sessions.contains(&tab_id)
    }

    pub(crate) fn has_tab(&self, tab_id: TabId) -> bool {
        self.state.lock().tabs.contains_key(&tab_id)
    }

    pub(crate) fn was_shut_down(&self) -> bool {
        self.state.lock().shutdowns > 0
    }

    /// Methods sent so far, in order.
    pub(crate) fn methods(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(|(_, method, _)| method.clone())
            .collect()
    }

    /// Params of the last call to `method`.
    pub(crate) fn last_params(&self, method: &str) -> Option<Value> {
        self.state
            .lock()
            .calls
            .iter()
            .rev()
            .find(|(_, m, _)| m == method)
            .map(|(_, _, params)| params.clone())
    }

    /// Changes a tab's URL and reports it.
    pub(crate) fn navigate(&self, tab_id: TabId, url: &str) {
        if let Some(tab) = self.state.lock().tabs.get_mut(&tab_id) {
            tab.url = url.to_string();
        }
        let _ = self.events.send(BrowserEvent::TabUpdated {
            tab_id,
            url: url.to_string(),
        });
    }

    /// Closes a tab from the browser side.
    pub(crate) fn close_externally(&self, tab_id: TabId) {
        let had_session = {
            let mut state = self.state.lock();
            state.tabs.remove(&tab_id);
            state.sessions.remove(&tab_id)
        };
        if had_session {
            let _ = self.events.send(BrowserEvent::DebuggerDetached {
                tab_id,
                reason: DetachReason::TargetClosed,
            });
        }
        let _ = self.events.send(BrowserEvent::TabClosed { tab_id });
    }

    /// Ends a session from the browser side.
    pub(crate) fn detach_externally(&self, tab_id: TabId, reason: &str) {
        self.state.lock().sessions.remove(&tab_id);
        let _ = self.events.send(BrowserEvent::DebuggerDetached {
            tab_id,
            reason: DetachReason::from_reason(reason),
        });
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        Ok(self.state.lock().tabs.values().cloned().collect())
    }

    async fn tab_info(&self, tab_id: TabId) -> Result<TabInfo> {
        self.state
            .lock()
            .tabs
            .get(&tab_id)
            .cloned()
            .ok_or_else(|| Error::tab_not_found(tab_id))
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo> {
        let next = {
            let mut state = self.state.lock();
            state.next_tab += 1;
            state.next_tab
        };
        let tab_id = self.add_tab(next, url);
        self.tab_info(tab_id).await
    }

    async fn close_tab(&self, tab_id: TabId) -> Result<()> {
        let mut state = self.state.lock();
        state
            .tabs
            .remove(&tab_id)
            .ok_or_else(|| Error::tab_not_found(tab_id))?;
        state.sessions.remove(&tab_id);
        Ok(())
    }

    async fn attach(&self, tab_id: TabId) -> Result<()> {
        let mut state = self.state.lock();
        state.attach_calls += 1;
        if let Some(message) = &state.attach_failure {
            return Err(Error::protocol(message.clone()));
        }
        if !state.tabs.contains_key(&tab_id) {
            return Err(Error::tab_not_found(tab_id));
        }
        state.sessions.insert(tab_id);
        Ok(())
    }

    async fn detach(&self, tab_id: TabId) -> Result<()> {
        let mut state = self.state.lock();
        state.sessions.remove(&tab_id);
        match &state.detach_failure {
            Some(message) => Err(Error::protocol(message.clone())),
            None => Ok(()),
        }
    }

    async fn send_command(&self, tab_id: TabId, method: &str, params: Value) -> Result<Value> {
        let delay = {
            let mut state = self.state.lock();
            if !state.sessions.contains(&tab_id) {
                return Err(Error::tab_not_attached(tab_id));
            }
            state.calls.push((tab_id, method.to_string(), params.clone()));
            state.delays.get(method).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.state.lock().responders.get(method) {
            Some(responder) => responder(&params),
            None => Ok(json!({})),
        }
    }

    fn shutdown(&self) {
        self.state.lock().shutdowns += 1;
    }
}
