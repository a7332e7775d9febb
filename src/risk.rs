//! C6: per-node and per-object risk MTBDDs, and the three Layer 3 evaluators built over them
//! (§4.6).
use crate::ast::ProbEvidence;
use crate::bdd::{BddManager, BddPtr, VarCategory};
use crate::error::{DflError, DflResult};
use crate::model::ModelStore;
use crate::mtbdd::{AddManager, AddPtr};
use crate::prob::node_prob;
use crate::rational::Rational;
use crate::traversal::find_config_reflection_nodes;
use indexmap::IndexMap;
use std::collections::HashMap;

/// A participant ready for risk computation: its compiled BDD (evidence already applied) and its
/// impact value. `name` is kept for warnings and for `most_risky`'s reported winner.
pub struct Participant {
    pub name: String,
    pub bdd: BddPtr,
    pub impact: Rational,
}

/// Builds the risk MTBDD `R_n` for a single participant (§4.6 "Single-node risk MTBDD"):
/// descend through the OP prefix emitting ADD branches, then cap each non-OP sub-BDD with the
/// constant `node_prob(node) * impact`.
pub fn build_risk_add(
    store: &ModelStore,
    bdd: &BddManager,
    add: &mut AddManager,
    root: BddPtr,
    impact: &Rational,
    prob_evidence: &ProbEvidence,
) -> DflResult<AddPtr> {
    let mut memo = HashMap::new();
    build_risk_add_rec(store, bdd, add, root, impact, prob_evidence, &mut memo)
}

fn build_risk_add_rec(
    store: &ModelStore,
    bdd: &BddManager,
    add: &mut AddManager,
    node: BddPtr,
    impact: &Rational,
    prob_evidence: &ProbEvidence,
    memo: &mut HashMap<BddPtr, AddPtr>,
) -> DflResult<AddPtr> {
    if let Some(&cached) = memo.get(&node) {
        return Ok(cached);
    }
    let is_op = bdd.var_of(node).is_some_and(|v| bdd.category(v) == VarCategory::ObjectProperty);
    let result = if is_op {
        let var = bdd.var_of(node).expect("checked above");
        let lo = build_risk_add_rec(store, bdd, add, bdd.low_of(node), impact, prob_evidence, memo)?;
        let hi = build_risk_add_rec(store, bdd, add, bdd.high_of(node), impact, prob_evidence, memo)?;
        add.branch(var, lo, hi)
    } else {
        let p = node_prob(store, bdd, node, prob_evidence)?;
        add.mk_terminal(p * impact)
    };
    memo.insert(node, result);
    Ok(result)
}

/// Sums the risk MTBDDs of every participant into the object's combined risk MTBDD (§4.6
/// "Per-object risk MTBDD").
pub fn object_risk_add(
    store: &ModelStore,
    bdd: &BddManager,
    add: &mut AddManager,
    participants: &[Participant],
    prob_evidence: &ProbEvidence,
) -> DflResult<AddPtr> {
    let mut total = add.mk_terminal(crate::rational::zero());
    for p in participants {
        if bdd.is_false(p.bdd) {
            log::warn!("participant `{}` is unsatisfiable under the active evidence; skipped", p.name);
            continue;
        }
        let r = build_risk_add(store, bdd, add, p.bdd, &p.impact, prob_evidence)?;
        total = add.add(total, r);
    }
    Ok(total)
}

/// `most_risky`: the single participant/configuration pair maximizing `node_prob * impact`
/// (§4.6). Ties are broken by iteration order over `participants` (§9 Open Question), i.e. the
/// first participant (in declaration order) to reach the maximum wins.
pub fn most_risky(
    store: &ModelStore,
    bdd: &BddManager,
    participants: &[Participant],
    prob_evidence: &ProbEvidence,
) -> DflResult<Option<(String, Rational)>> {
    let mut best: Option<(String, Rational)> = None;
    for p in participants {
        if bdd.is_false(p.bdd) {
            log::warn!("participant `{}` is unsatisfiable under the active evidence; skipped", p.name);
            continue;
        }
        for (reflection, _) in find_config_reflection_nodes(bdd, p.bdd) {
            let prob = node_prob(store, bdd, reflection, prob_evidence)?;
            let value = prob * &p.impact;
            match &best {
                Some((_, best_value)) if *best_value >= value => {}
                _ => best = Some((p.name.clone(), value)),
            }
        }
    }
    Ok(best)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Aggregation {
    Min,
    Max,
    Sum,
}

/// `total_risk(object, agg)`: fold the per-object MTBDD's terminal values (§4.6).
pub fn total_risk(add: &AddManager, object_add: AddPtr, agg: Aggregation) -> Rational {
    let values = add.terminal_values(object_add);
    let mut iter = values.into_iter();
    let first = match iter.next() {
        Some(v) => v,
        None => return crate::rational::zero(),
    };
    iter.fold(first, |acc, v| match agg {
        Aggregation::Min => acc.min(v),
        Aggregation::Max => acc.max(v),
        Aggregation::Sum => acc + v,
    })
}

/// `optimal_conf(object)`: the OP-configuration(s) minimizing the per-object MTBDD's value
/// (§4.6). A path omits an OP variable it never branched on ("either value is equally optimal on
/// this path").
pub fn optimal_conf(
    bdd: &BddManager,
    add: &AddManager,
    object_add: AddPtr,
) -> (Vec<IndexMap<String, bool>>, Rational) {
    let mut best: Option<Rational> = None;
    let mut paths: Vec<IndexMap<String, bool>> = Vec::new();
    let mut path = IndexMap::new();
    walk_paths(bdd, add, object_add, &mut path, &mut best, &mut paths);
    (paths, best.unwrap_or_else(crate::rational::zero))
}

fn walk_paths(
    bdd: &BddManager,
    add: &AddManager,
    node: AddPtr,
    path: &mut IndexMap<String, bool>,
    best: &mut Option<Rational>,
    paths: &mut Vec<IndexMap<String, bool>>,
) {
    if let Some(value) = add.terminal_value(node) {
        match best {
            None => {
                *best = Some(value.clone());
                paths.clear();
                paths.push(path.clone());
            }
            Some(b) if *value < *b => {
                *best = Some(value.clone());
                paths.clear();
                paths.push(path.clone());
            }
            Some(b) if *value == *b => {
                paths.push(path.clone());
            }
            _ => {}
        }
        return;
    }
    let var = add.var_of(node).expect("non-terminal has a variable");
    let name = bdd.var_name(var).to_string();

    path.insert(name.clone(), false);
    walk_paths(bdd, add, add.low_of(node), path, best, paths);
    path.insert(name.clone(), true);
    walk_paths(bdd, add, add.high_of(node), path, best, paths);
    path.shift_remove(&name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bdd::VarCategory;
    use crate::rational;

    #[test]
    fn total_risk_max_is_never_below_min() {
        let mut add = AddManager::new();
        let mut bdd = BddManager::new();
        let a = bdd.declare_var("a", VarCategory::ObjectProperty);
        let lo = add.mk_terminal(rational::parse_rational("0.01").unwrap());
        let hi = add.mk_terminal(rational::parse_rational("0.05").unwrap());
        let object_add = add.branch(a, lo, hi);

        let max = total_risk(&add, object_add, Aggregation::Max);
        let min = total_risk(&add, object_add, Aggregation::Min);
        assert!(max >= min);
        assert_eq!(max, rational::parse_rational("0.05").unwrap());
        assert_eq!(min, rational::parse_rational("0.01").unwrap());
    }

    #[test]
    fn optimal_conf_finds_the_single_minimal_path() {
        let mut add = AddManager::new();
        let mut bdd = BddManager::new();
        let a = bdd.declare_var("a", VarCategory::ObjectProperty);
        let b = bdd.declare_var("b", VarCategory::ObjectProperty);
        let low_low = add.mk_terminal(rational::parse_rational("0.01").unwrap());
        let other = add.mk_terminal(rational::parse_rational("0.02").unwrap());
        let b_node = add.branch(b, low_low, other);
        let object_add = add.branch(a, b_node, other);

        let (paths, value) = optimal_conf(&bdd, &add, object_add);
        assert_eq!(value, rational::parse_rational("0.01").unwrap());
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].get("a"), Some(&false));
        assert_eq!(paths[0].get("b"), Some(&false));
    }
}
