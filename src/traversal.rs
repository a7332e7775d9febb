//! C4: the reverse-topological / reflection-point traversals every numeric evaluator builds on.
//!
//! §9's non-complemented-layer fallback is in force here (see `crate::bdd`'s module doc): there
//! is no `negated` bit to XOR along a path, so this module carries no `complement` field anywhere
//! — `reachable_postorder` is a direct consequence of [`BddManager::reachable_sorted`]'s
//! children-before-parents ordering, and `find_config_reflection_nodes` tracks only
//! `parent_is_op`, exactly as the Design Notes describe for the simplified case.
use crate::bdd::{BddManager, BddPtr, VarCategory};
use indexmap::IndexSet;
use std::collections::HashSet;

/// Every node reachable from `root`, children before parents, each exactly once (§4.4's DFS
/// contract, minus the complement bookkeeping the non-complemented layer doesn't need).
pub fn reachable_postorder(manager: &BddManager, root: BddPtr) -> Vec<BddPtr> {
    manager.reachable_sorted(root)
}

/// The "hand-off" points where the OP prefix of a BDD ends and the event sub-DAG begins:
/// `(node, parent_is_op)` for every node whose parent on some root-to-node path is an OP variable
/// but the node itself is not (or is a terminal) — §4.4's `find_config_reflection_nodes`.
pub fn find_config_reflection_nodes(manager: &BddManager, root: BddPtr) -> Vec<(BddPtr, bool)> {
    let mut seen: HashSet<(BddPtr, bool)> = HashSet::new();
    let mut out = Vec::new();
    // Seed with `parent_is_op = true`: an implicit zero-length OP prefix precedes the root, so a
    // root that is itself non-OP (formula depends on no object property at all) is immediately a
    // reflection node rather than never being visited.
    let mut stack = vec![(root, true)];
    while let Some((node, parent_is_op)) = stack.pop() {
        let is_op = manager
            .var_of(node)
            .is_some_and(|v| manager.category(v) == VarCategory::ObjectProperty);
        if parent_is_op && !is_op {
            if seen.insert((node, parent_is_op)) {
                out.push((node, parent_is_op));
            }
            continue; // this is a reflection node: do not descend past it here.
        }
        if is_op {
            if !manager.is_terminal(node) {
                stack.push((manager.low_of(node), true));
                stack.push((manager.high_of(node), true));
            }
        } else if !manager.is_terminal(node) {
            stack.push((manager.low_of(node), false));
            stack.push((manager.high_of(node), false));
        }
    }
    out
}

/// Walks every root-to-`TRUE` path of `root`, collecting the names of the variables taken high
/// along it; a variable the path never branches on is a "don't care" and is simply absent from the
/// resulting set. Used by Layer 1's "compute all" mode (§1) after `minimal_assignments_bdd` has
/// already reduced `root` to its ⊆-minimal satisfying sets (§4.3) — at that point each root-to-
/// `TRUE` path *is* one minimal configuration, by construction.
pub fn minimal_satisfying_sets(manager: &BddManager, root: BddPtr) -> Vec<IndexSet<String>> {
    let mut out = Vec::new();
    let mut current = IndexSet::new();
    walk_true_paths(manager, root, &mut current, &mut out);
    out
}

fn walk_true_paths(
    manager: &BddManager,
    node: BddPtr,
    current: &mut IndexSet<String>,
    out: &mut Vec<IndexSet<String>>,
) {
    if manager.is_false(node) {
        return;
    }
    if manager.is_true(node) {
        out.push(current.clone());
        return;
    }
    let var = manager.var_of(node).expect("non-terminal has a variable");
    walk_true_paths(manager, manager.low_of(node), current, out);
    let name = manager.var_name(var).to_string();
    current.insert(name.clone());
    walk_true_paths(manager, manager.high_of(node), current, out);
    current.shift_remove(&name);
}
