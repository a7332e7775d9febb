//! C2: a single pre-pass over a formula AST that collects the variable sets a compilation will
//! need and enforces evidence legality (§4.2), before C3 ever touches a BDD manager.
use crate::ast::{CondExpr, Formula};
use crate::error::{DflError, DflResult};
use crate::evidence::EvidenceFrame;
use crate::model::{ModelStore, NameKind, TreeKind};
use indexmap::IndexSet;

/// The three disjoint variable sets a compiled formula needs declared, in OP → F → A order
/// (§3 "Variable universe").
#[derive(Clone, Debug, Default)]
pub struct VarUsage {
    pub op_vars: IndexSet<String>,
    pub fault_vars: IndexSet<String>,
    pub attack_vars: IndexSet<String>,
}

impl VarUsage {
    fn union_cond_props(&mut self, store: &ModelStore, cond: &CondExpr) {
        for prop in cond.properties() {
            self.op_vars.insert(prop);
        }
        let _ = store;
    }
}

/// Runs C2 over `formula`, returning the variable usage needed to declare a BDD manager.
pub fn descend(store: &ModelStore, formula: &Formula) -> DflResult<VarUsage> {
    let mut usage = VarUsage::default();
    let mut frames: Vec<EvidenceFrame> = Vec::new();
    walk(store, formula, &mut frames, &mut usage)?;
    Ok(usage)
}

fn walk(
    store: &ModelStore,
    formula: &Formula,
    frames: &mut Vec<EvidenceFrame>,
    usage: &mut VarUsage,
) -> DflResult<()> {
    match formula {
        Formula::Const(_) => Ok(()),
        Formula::NodeAtom(name) => {
            if let Some(ancestor) = EvidenceFrame::blacklisted_by(frames, name) {
                return Err(DflError::NodeAncestorEvidence {
                    descendant: name.clone(),
                    ancestor: ancestor.to_string(),
                });
            }
            match store.resolve_name(name) {
                Some(NameKind::AttackNode) => union_tree_node(store, TreeKind::Attack, name, usage),
                Some(NameKind::FaultNode) => union_tree_node(store, TreeKind::Fault, name, usage),
                Some(NameKind::ObjectProperty) => {
                    usage.op_vars.insert(name.clone());
                    Ok(())
                }
                None => Err(DflError::UnknownNode(name.clone())),
            }
        }
        Formula::Not(a) => walk(store, a, frames, usage),
        Formula::And(a, b)
        | Formula::Or(a, b)
        | Formula::Imp(a, b)
        | Formula::Iff(a, b)
        | Formula::Xor(a, b) => {
            walk(store, a, frames, usage)?;
            walk(store, b, frames, usage)
        }
        Formula::Mrs(a) => walk(store, a, frames, usage),
        Formula::WithBooleanEvidence(a, map) => {
            let mut new_blacklist = std::collections::HashMap::new();
            for target in map.keys() {
                classify_evidence_target(store, target, &mut new_blacklist)?;
            }
            for target in map.keys() {
                if let Some(ancestor) = EvidenceFrame::blacklisted_by(frames, target) {
                    return Err(DflError::EvidenceAncestorEvidence {
                        target: target.clone(),
                        ancestor: ancestor.to_string(),
                    });
                }
            }
            frames.push(EvidenceFrame { blacklist: new_blacklist, values: map.clone() });
            let result = walk(store, a, frames, usage);
            frames.pop();
            result
        }
    }
}

/// Validates one evidence target and, if it is a module intermediate node, adds its strict
/// descendants to the scope's blacklist (§4.2).
fn classify_evidence_target(
    store: &ModelStore,
    target: &str,
    blacklist: &mut std::collections::HashMap<String, String>,
) -> DflResult<()> {
    match store.resolve_name(target) {
        Some(NameKind::AttackNode) => classify_tree_target(store, TreeKind::Attack, target, blacklist),
        Some(NameKind::FaultNode) => classify_tree_target(store, TreeKind::Fault, target, blacklist),
        Some(NameKind::ObjectProperty) => Ok(()),
        None => Err(DflError::InvalidNodeEvidence(target.to_string())),
    }
}

fn classify_tree_target(
    store: &ModelStore,
    kind: TreeKind,
    target: &str,
    blacklist: &mut std::collections::HashMap<String, String>,
) -> DflResult<()> {
    let tree = store.tree(kind);
    let node = tree.get(target).expect("resolve_name already confirmed membership");
    if node.is_basic() {
        return Ok(());
    }
    if !store.is_module(tree, target) {
        return Err(DflError::NonModuleNode(target.to_string()));
    }
    for descendant in store.strict_descendants(tree, target) {
        blacklist.entry(descendant).or_insert_with(|| target.to_string());
    }
    Ok(())
}

/// Unions a named tree node's contribution into `usage`: its basic descendants become event
/// variables, and every descendant's condition contributes OP variables (§4.2).
fn union_tree_node(store: &ModelStore, kind: TreeKind, name: &str, usage: &mut VarUsage) -> DflResult<()> {
    let tree = store.tree(kind);
    let basics = store.basic_descendants(tree, name);
    match kind {
        TreeKind::Attack => usage.attack_vars.extend(basics),
        TreeKind::Fault => usage.fault_vars.extend(basics),
    }
    for descendant in store.descendants(tree, name) {
        if let Some(node) = tree.get(&descendant) {
            if let Some(cond) = &node.cond {
                usage.union_cond_props(store, cond);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::{Gate, GateKind, TreeNode};
    use crate::model::{DisruptionTree, ObjectGraph};
    use indexmap::IndexMap;

    fn basic(name: &str) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            gate: None,
            prob: None,
            impact: None,
            declared_objects: IndexSet::new(),
            cond: None,
        }
    }

    fn build_store() -> ModelStore {
        let mut nodes = IndexMap::new();
        nodes.insert(
            "R".to_string(),
            TreeNode {
                name: "R".to_string(),
                gate: Some(Gate { kind: GateKind::Or, children: vec!["a".to_string(), "b".to_string()] }),
                prob: None,
                impact: None,
                declared_objects: IndexSet::new(),
                cond: None,
            },
        );
        nodes.insert("a".to_string(), basic("a"));
        nodes.insert("b".to_string(), basic("b"));
        let attack = DisruptionTree { kind: TreeKind::Attack, root: "R".to_string(), nodes };
        let mut fnodes = IndexMap::new();
        fnodes.insert("FR".to_string(), basic("FR"));
        let fault = DisruptionTree { kind: TreeKind::Fault, root: "FR".to_string(), nodes: fnodes };
        ModelStore::build(attack, fault, ObjectGraph::default()).unwrap()
    }

    #[test]
    fn collects_basic_descendants_as_attack_vars() {
        let store = build_store();
        let usage = descend(&store, &Formula::NodeAtom("R".to_string())).unwrap();
        assert!(usage.attack_vars.contains("a"));
        assert!(usage.attack_vars.contains("b"));
    }

    #[test]
    fn evidence_on_descendant_of_evidence_bound_module_fails() {
        let store = build_store();
        let mut map = indexmap::IndexMap::new();
        map.insert("R".to_string(), true);
        let inner = Formula::NodeAtom("a".to_string());
        let formula = Formula::WithBooleanEvidence(Box::new(inner), map);
        let err = descend(&store, &formula).unwrap_err();
        assert!(matches!(err, DflError::NodeAncestorEvidence { .. }));
    }

    #[test]
    fn unknown_name_fails() {
        let store = build_store();
        let err = descend(&store, &Formula::NodeAtom("nope".to_string())).unwrap_err();
        assert!(matches!(err, DflError::UnknownNode(_)));
    }
}
