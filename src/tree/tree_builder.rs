use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::tree::tree_model::{Bounds, NodeId, NodeRecord, UiNode, UiTree};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("view record list is empty")]
    Empty,

    #[error("record at position {index} carries temp_id {temp_id}")]
    TempIdMismatch { index: usize, temp_id: NodeId },

    #[error("record {id} references missing parent {parent}")]
    DanglingParent { id: NodeId, parent: i64 },

    #[error("record {id} lists missing child {child}")]
    DanglingChild { id: NodeId, child: NodeId },

    #[error("no root record (parent -1)")]
    MissingRoot,

    #[error("more than one root record: {first} and {second}")]
    MultipleRoots { first: NodeId, second: NodeId },
}

/// Builds a pruned tree from flat view records.
///
/// Pass one links every record to its parent, invalid nodes included. Pass two
/// walks leaf-up and keeps a node when it is enabled and visible or when any
/// descendant is kept. A kept node lists its nearest kept descendants as
/// children, so reachability survives pruning. The root is always kept.
pub fn build(records: &[NodeRecord]) -> Result<UiTree, TreeError> {
    if records.is_empty() {
        return Err(TreeError::Empty);
    }

    let mut root = None;
    let mut raw_children: Vec<Vec<NodeId>> = vec![Vec::new(); records.len()];

    for (index, record) in records.iter().enumerate() {
        if record.temp_id != index {
            return Err(TreeError::TempIdMismatch {
                index,
                temp_id: record.temp_id,
            });
        }
        if let Some(&child) = record.children.iter().find(|&&c| c >= records.len()) {
            return Err(TreeError::DanglingChild { id: index, child });
        }
        if record.parent < 0 {
            if let Some(first) = root {
                return Err(TreeError::MultipleRoots { first, second: index });
            }
            root = Some(index);
            continue;
        }
        let parent = record.parent as usize;
        if parent >= records.len() || parent == index {
            return Err(TreeError::DanglingParent {
                id: index,
                parent: record.parent,
            });
        }
        raw_children[parent].push(index);
    }

    let root = root.ok_or(TreeError::MissingRoot)?;

    // Pre-order over the raw tree; records cut off from the root are never visited.
    let mut preorder = Vec::with_capacity(records.len());
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        preorder.push(id);
        stack.extend(raw_children[id].iter().rev());
    }

    let mut retained = vec![false; records.len()];
    for &id in preorder.iter().rev() {
        retained[id] = records[id].is_valid() || raw_children[id].iter().any(|&c| retained[c]);
    }
    retained[root] = true;

    let mut nodes = BTreeMap::new();
    let mut order = Vec::new();
    let mut stack = vec![(root, None)];
    while let Some((id, parent)) = stack.pop() {
        let mut children = Vec::new();
        splice_children(id, &raw_children, &retained, &mut children);
        order.push(id);
        for &child in children.iter().rev() {
            stack.push((child, Some(id)));
        }
        nodes.insert(id, to_node(&records[id], parent, children));
    }

    debug!(
        records = records.len(),
        retained = nodes.len(),
        "built ui tree"
    );

    Ok(UiTree { root, nodes, order })
}

fn splice_children(
    id: NodeId,
    raw_children: &[Vec<NodeId>],
    retained: &[bool],
    out: &mut Vec<NodeId>,
) {
    for &child in &raw_children[id] {
        if retained[child] {
            out.push(child);
        } else {
            splice_children(child, raw_children, retained, out);
        }
    }
}

fn to_node(record: &NodeRecord, parent: Option<NodeId>, children: Vec<NodeId>) -> UiNode {
    let class_name = record.class.clone().unwrap_or_default();
    let tag = class_name
        .rsplit('.')
        .next()
        .filter(|t| !t.is_empty())
        .unwrap_or("div")
        .to_string();

    UiNode {
        id: record.temp_id,
        tag,
        class_name,
        text: non_empty(&record.text),
        content_description: non_empty(&record.content_description),
        resource_id: non_empty(&record.resource_id)
            .map(|r| r.rsplit('/').next().unwrap_or_default().to_string()),
        bounds: Bounds::from_corners(record.bounds),
        scrollable: record.scrollable,
        editable: record.editable,
        clickable: record.clickable,
        long_clickable: record.long_clickable,
        checkable: record.checkable,
        checked: record.checked,
        selected: record.selected,
        parent,
        children,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

// ============================================================================
// Tree accessors
// ============================================================================

/// Attribute view of one node, as returned by `get_attributes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeAttributes {
    pub id: NodeId,
    pub resource_id: Option<String>,
    pub class_name: String,
    pub text: Option<String>,
    pub content_description: Option<String>,
    pub bounds: [[i32; 2]; 2],
    pub checked: bool,
    pub selected: bool,
    pub scrollable: bool,
    pub editable: bool,
    pub clickable: bool,
    pub long_clickable: bool,
    pub checkable: bool,
}

impl UiTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&UiNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Retained nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = &UiNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == id)
    }

    /// Retained scrollable nodes in document order.
    pub fn scrollable_ids(&self) -> Vec<NodeId> {
        self.iter().filter(|n| n.scrollable).map(|n| n.id).collect()
    }

    /// Nearest scrollable ancestor of `id`, excluding the node itself.
    pub fn scrollable_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.node(id)?.parent;
        while let Some(pid) = current {
            let node = self.node(pid)?;
            if node.scrollable {
                return Some(pid);
            }
            current = node.parent;
        }
        None
    }

    /// Independent tree rooted at `id` holding only its retained descendants.
    pub fn subtree(&self, id: NodeId) -> Option<UiTree> {
        let mut top = self.node(id)?.clone();
        top.parent = None;

        let mut nodes = BTreeMap::new();
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            let node = if current == id {
                top.clone()
            } else {
                match self.node(current) {
                    Some(n) => n.clone(),
                    None => continue,
                }
            };
            stack.extend(node.children.iter().rev());
            nodes.insert(current, node);
        }

        Some(UiTree {
            root: id,
            nodes,
            order,
        })
    }

    /// Own text, else the first descendant text, else the first descendant description.
    pub fn text_of(&self, id: NodeId) -> Option<String> {
        let node = self.node(id)?;
        if let Some(text) = &node.text {
            return Some(text.clone());
        }
        let sub = self.subtree(id)?;
        sub.iter()
            .find_map(|n| n.text.clone())
            .or_else(|| sub.iter().find_map(|n| n.content_description.clone()))
    }

    pub fn attributes(&self, id: NodeId) -> Option<NodeAttributes> {
        let node = self.node(id)?;
        Some(NodeAttributes {
            id: node.id,
            resource_id: node.resource_id.clone(),
            class_name: node.class_name.clone(),
            text: node.text.clone(),
            content_description: node.content_description.clone(),
            bounds: node.bounds.to_corners(),
            checked: node.checked || node.selected,
            selected: node.checked || node.selected,
            scrollable: node.scrollable,
            editable: node.editable,
            clickable: node.clickable,
            long_clickable: node.long_clickable,
            checkable: node.checkable,
        })
    }
}
