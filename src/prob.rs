//! C5: the probability evaluator — OP fast-forward followed by the attacker-max / fault-
//! expectation recurrence (§4.5).
use crate::ast::ProbEvidence;
use crate::bdd::{BddManager, BddPtr, VarCategory};
use crate::error::{DflError, DflResult};
use crate::model::ModelStore;
use crate::rational::{self, Rational};
use crate::traversal::reachable_postorder;
use std::collections::HashMap;

fn stored_prob(store: &ModelStore, name: &str) -> Option<Rational> {
    store
        .attack
        .get(name)
        .or_else(|| store.fault.get(name))
        .and_then(|n| n.prob.clone())
}

/// `eval_prob(φ_bdd, config, prob_evidence)` (§4.5). `config` must already be validated against
/// the formula's OP variables by the caller (missing-OP detection is a Layer 1/2 concern handled
/// before this is reached, per the §4 failure table) — any OP variable this still encounters is
/// treated as "not pinned" and fails with [`DflError::MissingConfiguration`].
pub fn eval_prob(
    store: &ModelStore,
    manager: &BddManager,
    root: BddPtr,
    config: &HashMap<String, bool>,
    prob_evidence: &ProbEvidence,
) -> DflResult<Rational> {
    let mut node = root;
    loop {
        let var = match manager.var_of(node) {
            None => break,
            Some(v) => v,
        };
        if manager.category(var) != VarCategory::ObjectProperty {
            break;
        }
        let name = manager.var_name(var);
        match config.get(name) {
            Some(true) => node = manager.high_of(node),
            Some(false) => node = manager.low_of(node),
            None => return Err(DflError::MissingConfiguration(name.to_string())),
        }
    }
    node_prob(store, manager, node, prob_evidence)
}

/// Post-order memoized probability of the sub-BDD rooted at `node`, which must no longer branch
/// on any OP variable (§4.5's `node_prob`).
pub fn node_prob(
    store: &ModelStore,
    manager: &BddManager,
    node: BddPtr,
    prob_evidence: &ProbEvidence,
) -> DflResult<Rational> {
    let order = reachable_postorder(manager, node);
    let mut memo: HashMap<BddPtr, Rational> = HashMap::new();
    for p in order {
        if manager.is_false(p) {
            memo.insert(p, rational::zero());
            continue;
        }
        if manager.is_true(p) {
            memo.insert(p, rational::one());
            continue;
        }
        let var = manager.var_of(p).expect("non-terminal node has a variable");
        let category = manager.category(var);
        let name = manager.var_name(var).to_string();
        if category == VarCategory::ObjectProperty {
            return Err(DflError::OpAfterPrefix(name));
        }
        let prob = match prob_evidence.get(&name) {
            Some(p) => p.clone(),
            None => stored_prob(store, &name).ok_or_else(|| DflError::MissingNodeProbability(name.clone()))?,
        };
        let lo = memo[&manager.low_of(p)].clone();
        let hi = memo[&manager.high_of(p)].clone();
        let value = match category {
            VarCategory::Fault => (rational::one() - &prob) * lo + &prob * hi,
            VarCategory::Attack => std::cmp::max(lo, prob * hi),
            VarCategory::ObjectProperty => unreachable!("handled above"),
        };
        memo.insert(p, value);
    }
    Ok(memo[&node].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bdd::VarCategory;
    use crate::model::tree::{Gate, GateKind, TreeNode};
    use crate::model::{DisruptionTree, ObjectGraph, TreeKind};
    use indexmap::{IndexMap, IndexSet};

    fn basic(name: &str, prob: &str) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            gate: None,
            prob: Some(rational::parse_rational(prob).unwrap()),
            impact: None,
            declared_objects: IndexSet::new(),
            cond: None,
        }
    }

    #[test]
    fn fault_and_gate_multiplies_probabilities() {
        // S2: F = DSL && LGJ, probs 0.20 and 0.70 -> P(F) = 0.14.
        let mut nodes = IndexMap::new();
        nodes.insert(
            "F".to_string(),
            TreeNode {
                name: "F".to_string(),
                gate: Some(Gate {
                    kind: GateKind::And,
                    children: vec!["DSL".to_string(), "LGJ".to_string()],
                }),
                prob: None,
                impact: None,
                declared_objects: IndexSet::new(),
                cond: None,
            },
        );
        nodes.insert("DSL".to_string(), basic("DSL", "0.20"));
        nodes.insert("LGJ".to_string(), basic("LGJ", "0.70"));
        let fault = DisruptionTree { kind: TreeKind::Fault, root: "F".to_string(), nodes };
        let mut anodes = IndexMap::new();
        anodes.insert("AR".to_string(), basic("AR", "0.0"));
        let attack = DisruptionTree { kind: TreeKind::Attack, root: "AR".to_string(), nodes: anodes };
        let store = ModelStore::build(attack, fault, ObjectGraph::default()).unwrap();

        let mut manager = BddManager::new();
        let dsl = manager.declare_var("DSL", VarCategory::Fault);
        let lgj = manager.declare_var("LGJ", VarCategory::Fault);
        let dsl_bdd = manager.mk_var(dsl);
        let lgj_bdd = manager.mk_var(lgj);
        let f_bdd = manager.and(dsl_bdd, lgj_bdd);

        let config = HashMap::new();
        let evidence = ProbEvidence::new();
        let p = eval_prob(&store, &manager, f_bdd, &config, &evidence).unwrap();
        assert_eq!(p, rational::parse_rational("0.14").unwrap());
    }

    #[test]
    fn attacker_maximizes_over_declining_the_attempt() {
        // S1: R = PL || DD, probs 0.10 and 0.13 -> attacker picks DD, P(R) = 0.13.
        let mut anodes = IndexMap::new();
        anodes.insert(
            "R".to_string(),
            TreeNode {
                name: "R".to_string(),
                gate: Some(Gate { kind: GateKind::Or, children: vec!["PL".to_string(), "DD".to_string()] }),
                prob: None,
                impact: None,
                declared_objects: IndexSet::new(),
                cond: None,
            },
        );
        anodes.insert("PL".to_string(), basic("PL", "0.10"));
        anodes.insert("DD".to_string(), basic("DD", "0.13"));
        let attack = DisruptionTree { kind: TreeKind::Attack, root: "R".to_string(), nodes: anodes };
        let mut fnodes = IndexMap::new();
        fnodes.insert("FR".to_string(), basic("FR", "0.0"));
        let fault = DisruptionTree { kind: TreeKind::Fault, root: "FR".to_string(), nodes: fnodes };
        let store = ModelStore::build(attack, fault, ObjectGraph::default()).unwrap();

        let mut manager = BddManager::new();
        let pl = manager.declare_var("PL", VarCategory::Attack);
        let dd = manager.declare_var("DD", VarCategory::Attack);
        let pl_bdd = manager.mk_var(pl);
        let dd_bdd = manager.mk_var(dd);
        let r_bdd = manager.or(pl_bdd, dd_bdd);

        let p = eval_prob(&store, &manager, r_bdd, &HashMap::new(), &ProbEvidence::new()).unwrap();
        assert_eq!(p, rational::parse_rational("0.13").unwrap());
    }
}
