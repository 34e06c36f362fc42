use std::collections::HashSet;

use sha1::{Digest, Sha1};

use crate::tree::tree_model::{UiNode, UiTree};

/// Content signature of one node. Bounds and ids are left out so that a node
/// that only moved during a scroll keeps its signature.
pub fn node_signature(node: &UiNode) -> String {
    let raw = format!(
        "[class]{}[resource_id]{}[text]{}[alt]{}[{},{}]",
        node.class_name,
        node.resource_id.as_deref().unwrap_or_default(),
        node.text.as_deref().unwrap_or_default(),
        node.content_description.as_deref().unwrap_or_default(),
        node.checked,
        node.selected,
    );
    sha1_hex(&raw)
}

pub fn sha1_hex(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn signatures(tree: &UiTree) -> HashSet<String> {
    tree.iter().map(node_signature).collect()
}

#[derive(Debug, Default)]
pub struct SnapshotDiff {
    pub added: HashSet<String>,
    pub removed: HashSet<String>,
}

impl SnapshotDiff {
    /// No node appeared or disappeared.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn diff(before: &HashSet<String>, after: &HashSet<String>) -> SnapshotDiff {
    SnapshotDiff {
        added: after.difference(before).cloned().collect(),
        removed: before.difference(after).cloned().collect(),
    }
}

/// Tracks every signature seen while scrolling one container.
#[derive(Debug, Default)]
pub struct SeenSignatures {
    seen: HashSet<String>,
}

impl SeenSignatures {
    pub fn new(tree: &UiTree) -> Self {
        Self {
            seen: signatures(tree),
        }
    }

    /// Records the tree and returns how many signatures were new.
    pub fn absorb(&mut self, tree: &UiTree) -> usize {
        let current = signatures(tree);
        let fresh = diff(&self.seen, &current).added;
        let count = fresh.len();
        self.seen.extend(fresh);
        count
    }
}
