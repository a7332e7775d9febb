//! Named, typed failures for the semantic layer (C1–C6).
//!
//! Lexical/syntax errors from [`crate::parsing`] stay as plain `Result<_, String>`, matching the
//! teacher's tokenizer/parser style — they are user-input errors reported with an offending
//! token, not part of this enum. Everything that the spec's failure-semantics table names gets
//! a variant here so the CLI can map it to the right exit code (§6).
use thiserror::Error;

/// Every named failure from the model store, formula descent, BDD compiler, probability
/// evaluator, and risk engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DflError {
    // --- cross-reference / load-time validation (exit code 2) ---
    #[error("disruption tree `{tree}` has no declared root")]
    MissingRoot { tree: String },
    #[error("disruption tree `{tree}` has more than one root candidate: {candidates:?}")]
    MultipleRoots { tree: String, candidates: Vec<String> },
    #[error("disruption tree `{tree}` contains a cycle through `{node}`")]
    CyclicTree { tree: String, node: String },
    #[error("disruption tree `{tree}` is not weakly connected (`{node}` is unreachable from the root)")]
    Disconnected { tree: String, node: String },
    #[error("name `{0}` is declared more than once across the attack tree, fault tree, and object graph")]
    DuplicateName(String),
    #[error("node `{node}` references unknown object `{object}`")]
    UnknownObject { node: String, object: String },
    #[error("node `{node}` condition references unknown object property `{property}`")]
    UnknownPropertyInCondition { node: String, property: String },
    #[error("object graph `has` relation references unknown object `{0}`")]
    UnknownHasTarget(String),

    // --- formula descent / evidence legality (exit code 3) ---
    #[error("unknown name `{0}` in formula")]
    UnknownNode(String),
    #[error("`{0}` is not a valid evidence target (must be a basic node, a module intermediate node, or an object property)")]
    InvalidNodeEvidence(String),
    #[error("evidence target `{0}` is an intermediate node that is not a module")]
    NonModuleNode(String),
    #[error("`{descendant}` is a descendant of `{ancestor}`, which already carries evidence, and cannot be named inside that scope")]
    NodeAncestorEvidence { descendant: String, ancestor: String },
    #[error("evidence target `{target}` lies inside the evidence scope already bound at `{ancestor}`")]
    EvidenceAncestorEvidence { target: String, ancestor: String },

    // --- configuration handling (exit code 3) ---
    #[error("missing configuration value for object property `{0}`")]
    MissingConfiguration(String),

    // --- probability / risk evaluation (exit code 3) ---
    #[error("no probability recorded for node `{0}`, which is reachable from the query")]
    MissingNodeProbability(String),
    #[error("no impact recorded for node `{0}`, which participates in the queried object")]
    MissingNodeImpact(String),
    #[error("object `{0}` is not declared in the object graph")]
    UnknownObjectName(String),
    #[error("internal invariant broken: object-property variable `{0}` was reached after the OP prefix")]
    OpAfterPrefix(String),
}

impl DflError {
    /// Exit code this failure should produce on the CLI (§6). Lexical/syntax errors from
    /// [`crate::parsing`] never become a `DflError` at all (they stay a plain `String` and are
    /// mapped to exit code 1 directly in `main`), so every variant here is either a
    /// cross-reference failure (2) or a formula/evaluation-time semantic failure (3).
    pub fn exit_code(&self) -> i32 {
        use DflError::*;
        match self {
            MissingRoot { .. }
            | MultipleRoots { .. }
            | CyclicTree { .. }
            | Disconnected { .. }
            | DuplicateName(_)
            | UnknownObject { .. }
            | UnknownPropertyInCondition { .. }
            | UnknownHasTarget(_) => 2,
            _ => 3,
        }
    }
}

pub type DflResult<T> = Result<T, DflError>;
