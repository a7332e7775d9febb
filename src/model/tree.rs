//! Attack/fault disruption trees (§3 "Disruption tree"): a DAG of events with AND/OR gates,
//! conditions, probabilities, impacts, and object associations.
use crate::ast::CondExpr;
use crate::rational::Rational;
use indexmap::IndexSet;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TreeKind {
    Attack,
    Fault,
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeKind::Attack => write!(f, "attack"),
            TreeKind::Fault => write!(f, "fault"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GateKind {
    And,
    Or,
}

/// A node's successors, absent for basic (leaf) nodes. Declaration order is preserved so the
/// compiler's "combine left to right with the gate" rule (§4.3) is deterministic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Gate {
    pub kind: GateKind,
    pub children: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub name: String,
    pub gate: Option<Gate>,
    pub prob: Option<Rational>,
    pub impact: Option<Rational>,
    /// Objects declared directly on this node (`objects=[...]`), before transitive `has`
    /// expansion — the model store expands this set at load time (§3 "Object graph").
    pub declared_objects: IndexSet<String>,
    pub cond: Option<CondExpr>,
}

impl TreeNode {
    pub fn is_basic(&self) -> bool {
        self.gate.is_none()
    }
}

/// One attack tree or one fault tree: a named, rooted DAG of [`TreeNode`]s.
#[derive(Clone, Debug)]
pub struct DisruptionTree {
    pub kind: TreeKind,
    pub root: String,
    pub nodes: indexmap::IndexMap<String, TreeNode>,
}

impl DisruptionTree {
    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Direct successors of `name`, empty for basic nodes or unknown names.
    pub fn children_of(&self, name: &str) -> &[String] {
        match self.nodes.get(name).and_then(|n| n.gate.as_ref()) {
            Some(gate) => &gate.children,
            None => &[],
        }
    }

    /// Direct predecessors of `name` within this tree (computed on demand; small trees in
    /// practice, so no cached reverse index is maintained — see [`crate::model::store`] for the
    /// precomputed version used by `is_module`).
    pub fn parents_of(&self, name: &str) -> Vec<&str> {
        self.nodes
            .values()
            .filter(|n| n.gate.as_ref().is_some_and(|g| g.children.iter().any(|c| c == name)))
            .map(|n| n.name.as_str())
            .collect()
    }
}
