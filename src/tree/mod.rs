pub mod diff;
pub mod markup;
pub mod tree_builder;
pub mod tree_model;

pub use tree_builder::{NodeAttributes, TreeError, build};
pub use tree_model::{Bounds, NodeId, NodeRecord, UiNode, UiTree};
