//! Accessibility tree simplification.
//!
//! `Accessibility.getFullAXTree` returns a flat list of nodes with string ids
//! and parent links. [`simplify_tree`] turns that list into a compact forest:
//!
//! - every node gets the ref `e<index>`, where `index` is its position in the
//!   raw list
//! - children are rebuilt from `parentId`, keeping raw order
//! - roots are nodes without a known parent, plus every `RootWebArea`
//!   (nested documents become roots of their own)
//! - ignored nodes are dropped and their children hoisted, unless
//!   `include_ignored` is set
//!
//! Refs that point at a DOM node are collected into a [`RefTable`] so later
//! commands can address the same element.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::BackendNodeId;
use crate::relay::RefTable;

// ============================================================================
// Constants
// ============================================================================

/// Role that marks a document root.
const ROOT_ROLE: &str = "RootWebArea";

/// Deepest level kept; anything below is cut.
pub const MAX_TREE_DEPTH: usize = 256;

// ============================================================================
// Raw nodes
// ============================================================================

/// Node as returned by `Accessibility.getFullAXTree`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxNode {
    /// Protocol node id.
    pub node_id: String,

    /// Whether the browser considers the node irrelevant.
    #[serde(default)]
    pub ignored: bool,

    /// Role value.
    #[serde(default)]
    pub role: Option<AxValue>,

    /// Accessible name.
    #[serde(default)]
    pub name: Option<AxValue>,

    /// Parent node id.
    #[serde(default)]
    pub parent_id: Option<String>,

    /// DOM node behind this accessibility node.
    #[serde(default, rename = "backendDOMNodeId")]
    pub backend_dom_node_id: Option<i64>,
}

/// Typed accessibility value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AxValue {
    /// Value type (`role`, `computedString`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Raw value.
    #[serde(default)]
    pub value: Option<Value>,
}

impl AxValue {
    /// Returns the value as a string, or `""`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.value.as_ref().and_then(Value::as_str).unwrap_or_default()
    }
}

impl AxNode {
    /// Returns the role string, or `""`.
    #[must_use]
    pub fn role(&self) -> &str {
        self.role.as_ref().map(AxValue::as_str).unwrap_or_default()
    }

    /// Returns the accessible name, or `""`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_ref().map(AxValue::as_str).unwrap_or_default()
    }
}

// ============================================================================
// Simplified nodes
// ============================================================================

/// One node of the simplified tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// Synthetic ref (`e<index>`).
    #[serde(rename = "ref")]
    pub element_ref: String,

    /// Accessibility role.
    pub role: String,

    /// Accessible name.
    pub name: String,

    /// Child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

/// Result of [`simplify_tree`].
#[derive(Debug, Clone, Default)]
pub struct SimplifiedTree {
    /// Root-level nodes.
    pub roots: Vec<SnapshotNode>,
    /// Refs that resolve to DOM nodes.
    pub refs: RefTable,
}

/// Formats the ref for a raw node index.
#[inline]
#[must_use]
pub fn element_ref(index: usize) -> String {
    format!("e{index}")
}

// ============================================================================
// simplify_tree
// ============================================================================

/// Builds the simplified forest from raw nodes.
#[must_use]
pub fn simplify_tree(nodes: &[AxNode], include_ignored: bool) -> SimplifiedTree {
    let index: FxHashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.node_id.as_str(), i))
        .collect();

    let parent_of = |i: usize| -> Option<usize> {
        let parent = index.get(nodes[i].parent_id.as_deref()?).copied()?;
        (parent != i).then_some(parent)
    };

    let is_root = |i: usize| parent_of(i).is_none() || nodes[i].role() == ROOT_ROLE;

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();

    for i in 0..nodes.len() {
        match parent_of(i) {
            Some(parent) if !is_root(i) => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let mut builder = Builder {
        nodes,
        children: &children,
        include_ignored,
        visited: FxHashSet::default(),
        refs: RefTable::new(),
    };

    let mut forest = Vec::new();
    for root in roots {
        forest.extend(builder.build(root, 0));
    }

    SimplifiedTree {
        roots: forest,
        refs: builder.refs,
    }
}

struct Builder<'a> {
    nodes: &'a [AxNode],
    children: &'a [Vec<usize>],
    include_ignored: bool,
    visited: FxHashSet<usize>,
    refs: RefTable,
}

impl Builder<'_> {
    /// Builds the subtree at `i`; an elided node yields its children instead.
    fn build(&mut self, i: usize, depth: usize) -> Vec<SnapshotNode> {
        if depth > MAX_TREE_DEPTH || !self.visited.insert(i) {
            return Vec::new();
        }

        let mut kids = Vec::new();
        for &child in &self.children[i] {
            kids.extend(self.build(child, depth + 1));
        }

        let node = &self.nodes[i];
        if node.ignored && !self.include_ignored {
            return kids;
        }

        let element_ref = element_ref(i);
        if let Some(backend) = node.backend_dom_node_id {
            self.refs.insert(element_ref.clone(), BackendNodeId::new(backend));
        }

        vec![SnapshotNode {
            element_ref,
            role: node.role().to_string(),
            name: node.name().to_string(),
            children: kids,
        }]
    }
}

// ============================================================================
// Tests
// ============================================================================
