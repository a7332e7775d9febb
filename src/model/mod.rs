//! C1: the model store — disruption trees and the object graph, validated once and frozen.
pub mod object_graph;
pub mod store;
pub mod tree;

pub use object_graph::{ObjectDef, ObjectGraph};
pub use store::{ModelStore, NameKind};
pub use tree::{DisruptionTree, Gate, GateKind, TreeKind, TreeNode};
