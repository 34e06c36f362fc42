use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Node identifier. Equal to the record's `temp_id`; unique within one snapshot only.
pub type NodeId = usize;

// ============================================================================
// Raw view records (device dump format)
// ============================================================================

/// One flat view record as dumped by the device driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub temp_id: NodeId,
    /// Index of the parent record, `-1` for the root.
    pub parent: i64,
    #[serde(default)]
    pub children: Vec<NodeId>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_description: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub bounds: [[i32; 2]; 2],
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub scrollable: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub long_clickable: bool,
    #[serde(default)]
    pub checkable: bool,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub selected: bool,
}

fn default_true() -> bool {
    true
}

impl NodeRecord {
    pub fn is_valid(&self) -> bool {
        self.enabled && self.visible
    }
}

// ============================================================================
// Built tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn from_corners(corners: [[i32; 2]; 2]) -> Self {
        Self {
            left: corners[0][0],
            top: corners[0][1],
            right: corners[1][0],
            bottom: corners[1][1],
        }
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn to_corners(&self) -> [[i32; 2]; 2] {
        [[self.left, self.top], [self.right, self.bottom]]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiNode {
    pub id: NodeId,
    /// Short class name (`Button` for `android.widget.Button`), `div` when unknown.
    pub tag: String,
    pub class_name: String,
    pub text: Option<String>,
    pub content_description: Option<String>,
    /// Resource id in short form (the part after the last `/`).
    pub resource_id: Option<String>,
    pub bounds: Bounds,
    pub scrollable: bool,
    pub editable: bool,
    pub clickable: bool,
    pub long_clickable: bool,
    pub checkable: bool,
    pub checked: bool,
    pub selected: bool,
    pub parent: Option<NodeId>,
    /// Retained children only, in document order.
    pub children: Vec<NodeId>,
}

impl UiNode {
    pub fn status(&self) -> Vec<&'static str> {
        let mut status = Vec::new();
        if self.checked {
            status.push("checked");
        }
        if self.selected {
            status.push("selected");
        }
        status
    }
}

/// Immutable arena over the retained nodes of one snapshot.
#[derive(Debug, Clone)]
pub struct UiTree {
    pub(crate) root: NodeId,
    pub(crate) nodes: BTreeMap<NodeId, UiNode>,
    /// Retained ids in pre-order.
    pub(crate) order: Vec<NodeId>,
}
