use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::locator::locator_model::{Axis, LocationStep, LocatorPath, Operand, Predicate};
use crate::locator::parser::parse;
use crate::tree::{NodeId, UiNode, UiTree};

/// First structural match of a candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorMatch {
    pub node: NodeId,
    /// Index into the candidate list that produced the match.
    pub candidate: usize,
}

#[derive(Clone, Copy)]
enum Context {
    Document,
    Node(NodeId),
}

/// All nodes selected by `path`, in document order.
pub fn evaluate(tree: &UiTree, path: &LocatorPath) -> Vec<NodeId> {
    let rank: HashMap<NodeId, usize> = tree
        .order
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();

    let mut contexts = vec![Context::Document];
    for step in &path.steps {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for &context in &contexts {
            for group in sibling_groups(tree, context, step.axis) {
                for id in apply_step(tree, step, &group) {
                    if seen.insert(id) {
                        selected.push(id);
                    }
                }
            }
        }
        selected.sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));
        if selected.is_empty() {
            return Vec::new();
        }
        contexts = selected.into_iter().map(Context::Node).collect();
    }

    contexts
        .into_iter()
        .filter_map(|c| match c {
            Context::Node(id) => Some(id),
            Context::Document => None,
        })
        .collect()
}

/// Child lists the step's name test runs against, one per parent.
fn sibling_groups(tree: &UiTree, context: Context, axis: Axis) -> Vec<Vec<NodeId>> {
    let own_children = |c: Context| -> Vec<NodeId> {
        match c {
            Context::Document => vec![tree.root()],
            Context::Node(id) => tree.children(id).to_vec(),
        }
    };

    match axis {
        Axis::Child => vec![own_children(context)],
        Axis::Descendant => {
            let mut groups = vec![own_children(context)];
            let mut stack: Vec<NodeId> = own_children(context).into_iter().rev().collect();
            while let Some(id) = stack.pop() {
                let children = tree.children(id);
                if !children.is_empty() {
                    groups.push(children.to_vec());
                    stack.extend(children.iter().rev());
                }
            }
            groups
        }
    }
}

fn apply_step(tree: &UiTree, step: &LocationStep, group: &[NodeId]) -> Vec<NodeId> {
    let mut matched: Vec<NodeId> = group
        .iter()
        .copied()
        .filter(|&id| match (&step.name, tree.node(id)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(name), Some(node)) => &node.tag == name,
        })
        .collect();

    for predicate in &step.predicates {
        let size = matched.len();
        matched = matched
            .into_iter()
            .enumerate()
            .filter(|(i, id)| {
                tree.node(*id)
                    .is_some_and(|node| holds(predicate, node, i + 1, size))
            })
            .map(|(_, id)| id)
            .collect();
    }
    matched
}

fn holds(predicate: &Predicate, node: &UiNode, position: usize, size: usize) -> bool {
    match predicate {
        Predicate::Position(n) => position == *n,
        Predicate::Last => position == size,
        Predicate::Exists(op) => operand_value(op, node).is_some(),
        Predicate::Equals(op, v) => operand_value(op, node).is_some_and(|x| &x == v),
        Predicate::NotEquals(op, v) => operand_value(op, node).is_some_and(|x| &x != v),
        Predicate::Contains(op, v) => operand_value(op, node).is_some_and(|x| x.contains(v.as_str())),
        Predicate::StartsWith(op, v) => {
            operand_value(op, node).is_some_and(|x| x.starts_with(v.as_str()))
        }
        Predicate::Not(inner) => !holds(inner, node, position, size),
        Predicate::And(a, b) => holds(a, node, position, size) && holds(b, node, position, size),
        Predicate::Or(a, b) => holds(a, node, position, size) || holds(b, node, position, size),
    }
}

fn operand_value(operand: &Operand, node: &UiNode) -> Option<String> {
    match operand {
        Operand::Text => node.text.clone(),
        Operand::Attribute(name) => match name.as_str() {
            "id" => Some(node.id.to_string()),
            "resource_id" => node.resource_id.clone(),
            "alt" | "content_description" => node.content_description.clone(),
            "class" | "class_name" => Some(node.class_name.clone()),
            "text" => node.text.clone(),
            "status" => {
                let status = node.status();
                (!status.is_empty()).then(|| status.join(","))
            }
            "scrollable" => Some(node.scrollable.to_string()),
            "editable" => Some(node.editable.to_string()),
            "clickable" => Some(node.clickable.to_string()),
            "long_clickable" => Some(node.long_clickable.to_string()),
            "checkable" => Some(node.checkable.to_string()),
            _ => None,
        },
    }
}

/// Every node any candidate selects, candidates in order. Unparseable candidates select nothing.
pub fn evaluate_all(tree: &UiTree, candidate: &str) -> Vec<NodeId> {
    match parse(candidate) {
        Ok(path) => evaluate(tree, &path),
        Err(e) => {
            warn!(locator = candidate, error = %e, "skipping unparseable locator");
            Vec::new()
        }
    }
}

/// Tries each candidate in order; the first one that selects anything wins.
pub fn first_match(tree: &UiTree, candidates: &[String]) -> Option<LocatorMatch> {
    candidates.iter().enumerate().find_map(|(index, candidate)| {
        evaluate_all(tree, candidate)
            .first()
            .map(|&node| LocatorMatch {
                node,
                candidate: index,
            })
    })
}

impl UiTree {
    pub fn query(&self, candidates: &[String]) -> Option<NodeId> {
        first_match(self, candidates).map(|m| m.node)
    }
}
