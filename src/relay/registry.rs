//! Tab registry.
//!
//! The registry records which tabs have a live debugging session. It is plain
//! data with no I/O; callers reach it through [`SharedRegistry`] and must not
//! hold the lock across an `.await`, so every mutation completes before the
//! I/O that depends on it starts.
//!
//! Each entry may carry a [`RefTable`] from the tab's latest snapshot. The
//! table is replaced by every snapshot and dropped with the entry.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::identifiers::{BackendNodeId, TabId};

// ============================================================================
// Types
// ============================================================================

/// Registry shared between the dispatcher, handlers and the event loop.
pub type SharedRegistry = Arc<Mutex<TabRegistry>>;

// ============================================================================
// TabEntry
// ============================================================================

/// Attachment state of one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabEntry {
    /// Tab id.
    pub tab_id: TabId,
    /// Whether a debugging session is open.
    pub attached: bool,
    /// Last known URL.
    pub url: String,
}

impl TabEntry {
    /// Creates an entry for a freshly attached tab.
    #[inline]
    #[must_use]
    pub fn attached(tab_id: TabId, url: impl Into<String>) -> Self {
        Self {
            tab_id,
            attached: true,
            url: url.into(),
        }
    }
}

// ============================================================================
// RefTable
// ============================================================================

/// Snapshot refs mapped to backend DOM nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefTable {
    refs: FxHashMap<String, BackendNodeId>,
}

impl RefTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a ref.
    pub fn insert(&mut self, element_ref: impl Into<String>, node: BackendNodeId) {
        self.refs.insert(element_ref.into(), node);
    }

    /// Looks up a ref.
    #[inline]
    #[must_use]
    pub fn get(&self, element_ref: &str) -> Option<BackendNodeId> {
        self.refs.get(element_ref).copied()
    }

    /// Returns the number of refs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns `true` if the table holds no refs.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

// ============================================================================
// TabRegistry
// ============================================================================

/// Tab id → [`TabEntry`] map.
#[derive(Debug, Default)]
pub struct TabRegistry {
    entries: FxHashMap<TabId, TabEntry>,
    refs: FxHashMap<TabId, RefTable>,
}

impl TabRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry ready for sharing.
    #[must_use]
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Returns a copy of a tab's entry.
    #[must_use]
    pub fn get(&self, tab_id: TabId) -> Option<TabEntry> {
        self.entries.get(&tab_id).cloned()
    }

    /// Returns `true` if the tab has an attached entry.
    #[must_use]
    pub fn is_attached(&self, tab_id: TabId) -> bool {
        self.entries.get(&tab_id).is_some_and(|entry| entry.attached)
    }

    /// Inserts or replaces an entry.
    pub fn set(&mut self, entry: TabEntry) {
        self.entries.insert(entry.tab_id, entry);
    }

    /// Removes an entry and its ref table.
    pub fn delete(&mut self, tab_id: TabId) -> Option<TabEntry> {
        self.refs.remove(&tab_id);
        self.entries.remove(&tab_id)
    }

    /// Updates the URL of an existing entry.
    ///
    /// Returns `true` if the entry exists and the URL changed.
    pub fn update_url(&mut self, tab_id: TabId, url: &str) -> bool {
        match self.entries.get_mut(&tab_id) {
            Some(entry) if entry.url != url => {
                entry.url = url.to_string();
                true
            }
            _ => false,
        }
    }

    /// Returns copies of all entries, ordered by tab id.
    #[must_use]
    pub fn entries(&self) -> Vec<(TabId, TabEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(tab_id, entry)| (*tab_id, entry.clone()))
            .collect();
        entries.sort_by_key(|(tab_id, _)| *tab_id);
        entries
    }

    /// Replaces a tab's ref table.
    ///
    /// Returns `false` (and stores nothing) if the tab has no entry.
    pub fn set_refs(&mut self, tab_id: TabId, refs: RefTable) -> bool {
        if !self.entries.contains_key(&tab_id) {
            return false;
        }
        self.refs.insert(tab_id, refs);
        true
    }

    /// Resolves a ref from the tab's latest snapshot.
    #[must_use]
    pub fn resolve_ref(&self, tab_id: TabId, element_ref: &str) -> Option<BackendNodeId> {
        self.refs.get(&tab_id)?.get(element_ref)
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no tab is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
