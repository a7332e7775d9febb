//! Shared evidence-scope bookkeeping used by both descent (C2) and the compiler (C3).
use crate::ast::BoolEvidence;
use std::collections::HashMap;

/// One `with_boolean_evidence` frame on the active stack, as seen by an atom lookup or a nested
/// evidence adjunction (§4.2, §4.3).
#[derive(Clone, Debug)]
pub struct EvidenceFrame {
    /// Names blacklisted from appearing as a bare atom inside this scope, each mapped to the
    /// specific evidence-bound module node whose strict descendant it is. A scope may bind several
    /// module targets at once (e.g. `[M1:1, M2:1]`), so a flat set of names isn't enough to report
    /// which one actually blacklists a given descendant. Basic-node/object-property evidence
    /// targets add no blacklist entries of their own.
    pub blacklist: HashMap<String, String>,
    pub values: BoolEvidence,
}

impl EvidenceFrame {
    /// The currently effective value of `name` if any active frame (innermost first) pins it.
    pub fn lookup(frames: &[EvidenceFrame], name: &str) -> Option<bool> {
        for frame in frames.iter().rev() {
            if let Some(v) = frame.values.get(name) {
                return Some(*v);
            }
        }
        None
    }

    /// The specific evidence-bound ancestor that blacklists `name` in any active frame (innermost
    /// first), if any (§4.2's `NodeAncestorEvidence` check).
    pub fn blacklisted_by<'a>(frames: &'a [EvidenceFrame], name: &str) -> Option<&'a str> {
        frames.iter().rev().find_map(|f| f.blacklist.get(name)).map(String::as_str)
    }
}
