//! Orchestration: dispatches a parsed [`Query`] across the three layers, owning the per-query
//! `BddManager`/`AddManager` lifecycle (§3 "Lifecycle": "A BDD manager is created per Layer 2/3
//! query ... for Layer 1, a fresh manager per formula is acceptable").
use crate::ast::{BoolEvidence, CmpOp, Formula, Layer2Expr, ProbEvidence, Query};
use crate::bdd::{BddManager, BddPtr};
use crate::compiler::{declare_variables, minimal_assignments_bdd, Compiler};
use crate::descent::{self, VarUsage};
use crate::error::{DflError, DflResult};
use crate::model::{ModelStore, TreeKind};
use crate::mtbdd::AddManager;
use crate::rational::Rational;
use crate::risk::{self, Aggregation, Participant};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// The outcome of a single query, shaped for [`crate::result_print`].
pub enum QueryResult {
    Boolean(bool),
    MinimalConfigs(Vec<IndexSet<String>>),
    Probability { value: Rational, op: CmpOp, threshold: Rational, holds: bool },
    MostRisky { winner: Option<(String, Rational)> },
    TotalRisk(Rational),
    OptimalConf { paths: Vec<IndexMap<String, bool>>, value: Rational },
}

/// Checks a query configuration against the OP variables a formula actually uses: unknown OP
/// names in `config` are warned and dropped (§3 "Configuration"), OPs the formula needs but
/// `config` omits fail with [`DflError::MissingConfiguration`].
fn resolve_config(config: &IndexMap<String, bool>, usage: &VarUsage) -> DflResult<HashMap<String, bool>> {
    for key in config.keys() {
        if !usage.op_vars.contains(key) {
            log::warn!("configuration entry `{key}` is not an object property this formula depends on; dropped");
        }
    }
    let mut resolved = HashMap::new();
    for op in &usage.op_vars {
        match config.get(op) {
            Some(v) => {
                resolved.insert(op.clone(), *v);
            }
            None => return Err(DflError::MissingConfiguration(op.clone())),
        }
    }
    Ok(resolved)
}

/// Checks a query configuration against *every* variable a formula uses — object properties and
/// attack/fault basics alike, not just OP (contrast [`resolve_config`], which Layer 2/3 use).
/// Grounded in `examples/original_source`'s `check_layer1_query`, whose `needed_vars = bdd.support`
/// check is never narrowed to object properties the way Layer 2's `check_layer2_query` narrows its
/// own to `object_properties.intersection(bdd.support)`: Layer 1 "check" has no probabilistic or
/// adversarial reading of an attack/fault basic, so the only way to give it a truth value is for
/// the caller to supply one directly.
fn resolve_full_config(config: &IndexMap<String, bool>, usage: &VarUsage) -> DflResult<HashMap<String, bool>> {
    let needed: std::collections::HashSet<&String> =
        usage.op_vars.iter().chain(usage.fault_vars.iter()).chain(usage.attack_vars.iter()).collect();
    for key in config.keys() {
        if !needed.contains(key) {
            log::warn!("configuration entry `{key}` is not used by this formula; dropped");
        }
    }
    let mut resolved = HashMap::new();
    for name in needed {
        match config.get(name) {
            Some(v) => {
                resolved.insert(name.clone(), *v);
            }
            None => return Err(DflError::MissingConfiguration(name.clone())),
        }
    }
    Ok(resolved)
}

/// Layer 1 "check" (§1, §4.3): `config` must assign every variable the formula uses, then the
/// formula is evaluated as a single total boolean assignment — the restricted BDD is guaranteed to
/// reduce all the way to a terminal once every variable in its support has been pinned.
fn eval_boolean(store: &ModelStore, config: &IndexMap<String, bool>, formula: &Formula) -> DflResult<bool> {
    let usage = descent::descend(store, formula)?;
    let mut manager = BddManager::new();
    declare_variables(&mut manager, &usage);
    let resolved = resolve_full_config(config, &usage)?;

    let mut compiler = Compiler::new(store, &mut manager);
    let mut node = compiler.compile(formula)?;
    for (name, value) in &resolved {
        let var = manager.var_by_name(name).expect("declared above");
        node = manager.restrict(node, var, *value);
    }
    debug_assert!(manager.is_terminal(node), "a total assignment must reduce a BDD to a terminal");
    Ok(manager.is_true(node))
}

/// Layer 1 "compute all" (§1's "enumerate the minimal configurations that satisfy it",
/// `{config} [[formula]]`): `config` only needs to cover `formula`'s object properties (unlike
/// `eval_boolean` above), and the attack/fault basics are exactly what this mode solves for,
/// reusing the same ⊆-minimality construction as `MRS` but parameterized over the event variables
/// instead of relying on the caller to name one particular minimal set. Grounded in
/// `examples/original_source`'s `check_layer1_query` `compute_all` branch and
/// `test_layer1_compute_all.py`'s set-of-`frozenset`s expectations.
fn eval_minimal_configs(
    store: &ModelStore,
    config: &IndexMap<String, bool>,
    formula: &Formula,
) -> DflResult<Vec<IndexSet<String>>> {
    let usage = descent::descend(store, formula)?;
    let mut manager = BddManager::new();
    declare_variables(&mut manager, &usage);
    let resolved = resolve_config(config, &usage)?;

    let mut compiler = Compiler::new(store, &mut manager);
    let mut node = compiler.compile(formula)?;
    for (name, value) in &resolved {
        let var = manager.var_by_name(name).expect("declared above");
        node = manager.restrict(node, var, *value);
    }

    let event_vars: Vec<_> = usage
        .fault_vars
        .iter()
        .chain(usage.attack_vars.iter())
        .filter_map(|name| manager.var_by_name(name))
        .collect();
    // A suffix the `Compiler`'s own `MRS` counter (which starts at 1 and increments per use)
    // cannot reach in practice, so a top-level `compute_all` minimization never collides with a
    // nested `MRS(...)` inside the same formula.
    let minimized = minimal_assignments_bdd(&mut manager, node, &event_vars, u32::MAX);
    Ok(crate::traversal::minimal_satisfying_sets(&manager, minimized))
}

/// Composes the probability-evidence frames visible at a `Compare` leaf: every enclosing
/// `WithProbabilityEvidence` (outermost first), then the comparison's own `local_evidence` last
/// so it shadows all of them (§3 "Evidence" — same inner-shadows-outer rule as boolean evidence).
fn compose_prob_evidence(stack: &[&ProbEvidence], local: &ProbEvidence) -> ProbEvidence {
    let mut out = ProbEvidence::new();
    for frame in stack {
        for (k, v) in frame.iter() {
            out.insert(k.clone(), v.clone());
        }
    }
    for (k, v) in local.iter() {
        out.insert(k.clone(), v.clone());
    }
    out
}

fn collect_layer2_formulas<'a>(expr: &'a Layer2Expr, out: &mut Vec<&'a Formula>) {
    match expr {
        Layer2Expr::Compare(cmp) => out.push(&cmp.formula),
        Layer2Expr::Not(a) => collect_layer2_formulas(a, out),
        Layer2Expr::And(a, b)
        | Layer2Expr::Or(a, b)
        | Layer2Expr::Imp(a, b)
        | Layer2Expr::Iff(a, b)
        | Layer2Expr::Xor(a, b) => {
            collect_layer2_formulas(a, out);
            collect_layer2_formulas(b, out);
        }
        Layer2Expr::WithProbabilityEvidence(a, _) => collect_layer2_formulas(a, out),
    }
}

/// Evaluates a Layer 2 expression to `(probability of the single comparison the caller asked
/// about, whether it holds)` isn't quite the shape we need for a boolean tree, so this returns
/// just the boolean: each `Compare` leaf resolves its own probability independently, then ordinary
/// boolean connectives combine the leaves (S6).
fn eval_layer2(
    store: &ModelStore,
    manager: &BddManager,
    compiled: &HashMap<*const Formula, BddPtr>,
    config: &HashMap<String, bool>,
    expr: &Layer2Expr,
    evidence_stack: &mut Vec<ProbEvidence>,
) -> DflResult<bool> {
    match expr {
        Layer2Expr::Compare(cmp) => {
            let bdd = *compiled.get(&(&cmp.formula as *const Formula)).expect("every comparison was pre-compiled");
            let stack_refs: Vec<&ProbEvidence> = evidence_stack.iter().collect();
            let composed = compose_prob_evidence(&stack_refs, &cmp.local_evidence);
            let value = crate::prob::eval_prob(store, manager, bdd, config, &composed)?;
            Ok(cmp.op.holds(&value, &cmp.threshold))
        }
        Layer2Expr::Not(a) => Ok(!eval_layer2(store, manager, compiled, config, a, evidence_stack)?),
        Layer2Expr::And(a, b) => {
            let a = eval_layer2(store, manager, compiled, config, a, evidence_stack)?;
            let b = eval_layer2(store, manager, compiled, config, b, evidence_stack)?;
            Ok(a && b)
        }
        Layer2Expr::Or(a, b) => {
            let a = eval_layer2(store, manager, compiled, config, a, evidence_stack)?;
            let b = eval_layer2(store, manager, compiled, config, b, evidence_stack)?;
            Ok(a || b)
        }
        Layer2Expr::Imp(a, b) => {
            let a = eval_layer2(store, manager, compiled, config, a, evidence_stack)?;
            let b = eval_layer2(store, manager, compiled, config, b, evidence_stack)?;
            Ok(!a || b)
        }
        Layer2Expr::Iff(a, b) => {
            let a = eval_layer2(store, manager, compiled, config, a, evidence_stack)?;
            let b = eval_layer2(store, manager, compiled, config, b, evidence_stack)?;
            Ok(a == b)
        }
        Layer2Expr::Xor(a, b) => {
            let a = eval_layer2(store, manager, compiled, config, a, evidence_stack)?;
            let b = eval_layer2(store, manager, compiled, config, b, evidence_stack)?;
            Ok(a != b)
        }
        Layer2Expr::WithProbabilityEvidence(a, map) => {
            evidence_stack.push(map.clone());
            let result = eval_layer2(store, manager, compiled, config, a, evidence_stack);
            evidence_stack.pop();
            result
        }
    }
}

fn eval_probability(
    store: &ModelStore,
    config: &IndexMap<String, bool>,
    expr: &Layer2Expr,
) -> DflResult<(Rational, CmpOp, Rational, bool)> {
    let mut formulas = Vec::new();
    collect_layer2_formulas(expr, &mut formulas);

    let mut usage = VarUsage::default();
    for f in &formulas {
        let u = descent::descend(store, f)?;
        usage.op_vars.extend(u.op_vars);
        usage.fault_vars.extend(u.fault_vars);
        usage.attack_vars.extend(u.attack_vars);
    }
    let mut manager = BddManager::new();
    declare_variables(&mut manager, &usage);
    let resolved = resolve_config(config, &usage)?;

    let mut compiled: HashMap<*const Formula, BddPtr> = HashMap::new();
    {
        let mut compiler = Compiler::new(store, &mut manager);
        for f in &formulas {
            let bdd = compiler.compile(f)?;
            compiled.insert(*f as *const Formula, bdd);
        }
    }

    let mut stack = Vec::new();
    let holds = eval_layer2(store, &manager, &compiled, &resolved, expr, &mut stack)?;

    // The single-comparison, top-level-query case (Layer 2's literal CLI shape, §6) also wants the
    // raw probability and threshold for `result_print`; boolean combinations (S6) only surface
    // the combined `holds`, so the reported value/threshold are the top comparison's if there is
    // exactly one, else a sentinel pair that `result_print` knows not to show.
    let (value, op, threshold) = match expr {
        Layer2Expr::Compare(cmp) => {
            let bdd = *compiled.get(&(&cmp.formula as *const Formula)).unwrap();
            let composed = compose_prob_evidence(&[], &cmp.local_evidence);
            let value = crate::prob::eval_prob(store, &manager, bdd, &resolved, &composed)?;
            (value, cmp.op, cmp.threshold.clone())
        }
        _ => (crate::rational::zero(), CmpOp::Eq, crate::rational::zero()),
    };
    Ok((value, op, threshold, holds))
}

fn build_participants(
    store: &ModelStore,
    object: &str,
    evidence: &BoolEvidence,
    kinds: &[TreeKind],
) -> DflResult<(BddManager, Vec<Participant>)> {
    if !store.objects.contains(object) {
        return Err(DflError::UnknownObjectName(object.to_string()));
    }
    let names: Vec<String> = store
        .participants(object)
        .into_iter()
        .filter(|(kind, _)| kinds.contains(kind))
        .map(|(_, name)| name)
        .collect();

    let wrapped: Vec<Formula> = names
        .iter()
        .map(|name| {
            let atom = Formula::NodeAtom(name.clone());
            if evidence.is_empty() {
                atom
            } else {
                Formula::WithBooleanEvidence(Box::new(atom), evidence.clone())
            }
        })
        .collect();

    let mut usage = VarUsage::default();
    for f in &wrapped {
        let u = descent::descend(store, f)?;
        usage.op_vars.extend(u.op_vars);
        usage.fault_vars.extend(u.fault_vars);
        usage.attack_vars.extend(u.attack_vars);
    }
    let mut manager = BddManager::new();
    declare_variables(&mut manager, &usage);

    let mut participants = Vec::with_capacity(names.len());
    {
        let mut compiler = Compiler::new(store, &mut manager);
        for (name, formula) in names.iter().zip(wrapped.iter()) {
            let bdd = compiler.compile(formula)?;
            let impact = store
                .tree(if store.attack.contains(name) { TreeKind::Attack } else { TreeKind::Fault })
                .get(name)
                .and_then(|n| n.impact.clone())
                .ok_or_else(|| DflError::MissingNodeImpact(name.clone()))?;
            participants.push(Participant { name: name.clone(), bdd, impact });
        }
    }
    Ok((manager, participants))
}

/// Runs a fully parsed query to completion (§6's three layers). Each call owns a fresh BDD/ADD
/// manager per §3's lifecycle rule.
pub fn run_query(store: &ModelStore, query: &Query) -> DflResult<QueryResult> {
    match query {
        Query::Boolean { config, formula } => {
            let holds = eval_boolean(store, config, formula)?;
            Ok(QueryResult::Boolean(holds))
        }
        Query::MinimalConfigs { config, formula } => {
            let sets = eval_minimal_configs(store, config, formula)?;
            Ok(QueryResult::MinimalConfigs(sets))
        }
        Query::Probability { config, expr } => {
            let (value, op, threshold, holds) = eval_probability(store, config, expr)?;
            Ok(QueryResult::Probability { value, op, threshold, holds })
        }
        Query::MostRiskyAttack { object, evidence } => {
            let (manager, participants) = build_participants(store, object, evidence, &[TreeKind::Attack])?;
            let winner = risk::most_risky(store, &manager, &participants, &ProbEvidence::new())?;
            Ok(QueryResult::MostRisky { winner })
        }
        Query::MostRiskyFault { object, evidence } => {
            let (manager, participants) = build_participants(store, object, evidence, &[TreeKind::Fault])?;
            let winner = risk::most_risky(store, &manager, &participants, &ProbEvidence::new())?;
            Ok(QueryResult::MostRisky { winner })
        }
        Query::OptimalConf { object, evidence } => {
            let (manager, participants) =
                build_participants(store, object, evidence, &[TreeKind::Attack, TreeKind::Fault])?;
            let mut add = AddManager::new();
            let object_add = risk::object_risk_add(store, &manager, &mut add, &participants, &ProbEvidence::new())?;
            let (paths, value) = risk::optimal_conf(&manager, &add, object_add);
            Ok(QueryResult::OptimalConf { paths, value })
        }
        Query::MaxTotalRisk { object, evidence } => {
            let (manager, participants) =
                build_participants(store, object, evidence, &[TreeKind::Attack, TreeKind::Fault])?;
            let mut add = AddManager::new();
            let object_add = risk::object_risk_add(store, &manager, &mut add, &participants, &ProbEvidence::new())?;
            let value = risk::total_risk(&add, object_add, Aggregation::Max);
            Ok(QueryResult::TotalRisk(value))
        }
        Query::MinTotalRisk { object, evidence } => {
            let (manager, participants) =
                build_participants(store, object, evidence, &[TreeKind::Attack, TreeKind::Fault])?;
            let mut add = AddManager::new();
            let object_add = risk::object_risk_add(store, &manager, &mut add, &participants, &ProbEvidence::new())?;
            let value = risk::total_risk(&add, object_add, Aggregation::Min);
            Ok(QueryResult::TotalRisk(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::{Gate, GateKind, TreeNode};
    use crate::model::{DisruptionTree, ObjectGraph};
    use indexmap::IndexSet;

    fn basic(name: &str, prob: &str, impact: &str) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            gate: None,
            prob: Some(crate::rational::parse_rational(prob).unwrap()),
            impact: Some(crate::rational::parse_rational(impact).unwrap()),
            declared_objects: IndexSet::new(),
            cond: None,
        }
    }

    fn s1_store() -> ModelStore {
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
        anodes.insert("PL".to_string(), basic("PL", "0.10", "1"));
        anodes.insert("DD".to_string(), basic("DD", "0.13", "1"));
        let attack = DisruptionTree { kind: TreeKind::Attack, root: "R".to_string(), nodes: anodes };
        let mut fnodes = IndexMap::new();
        fnodes.insert("FR".to_string(), basic("FR", "0.0", "0"));
        let fault = DisruptionTree { kind: TreeKind::Fault, root: "FR".to_string(), nodes: fnodes };
        ModelStore::build(attack, fault, ObjectGraph::default()).unwrap()
    }

    #[test]
    fn s1_probability_query_matches_attacker_maximum() {
        let store = s1_store();
        let expr = Layer2Expr::Compare(crate::ast::ProbComparison {
            formula: Formula::NodeAtom("R".to_string()),
            op: CmpOp::Eq,
            threshold: crate::rational::parse_rational("0.13").unwrap(),
            local_evidence: ProbEvidence::new(),
        });
        let query = Query::Probability { config: IndexMap::new(), expr };
        let result = run_query(&store, &query).unwrap();
        match result {
            QueryResult::Probability { holds, .. } => assert!(holds),
            _ => panic!("expected a probability result"),
        }
    }

    #[test]
    fn boolean_check_requires_every_event_variable_in_config() {
        let store = s1_store();
        let query = Query::Boolean { config: IndexMap::new(), formula: Formula::NodeAtom("R".to_string()) };
        let err = run_query(&store, &query).unwrap_err();
        assert!(matches!(err, DflError::MissingConfiguration(_)));
    }

    #[test]
    fn boolean_check_evaluates_a_total_assignment() {
        let store = s1_store();
        let mut config = IndexMap::new();
        config.insert("PL".to_string(), true);
        config.insert("DD".to_string(), false);
        let query = Query::Boolean { config, formula: Formula::NodeAtom("R".to_string()) };
        let result = run_query(&store, &query).unwrap();
        match result {
            QueryResult::Boolean(holds) => assert!(holds),
            _ => panic!("expected a boolean result"),
        }
    }

    #[test]
    fn compute_all_enumerates_the_minimal_attack_sets() {
        let store = s1_store();
        let query = Query::MinimalConfigs { config: IndexMap::new(), formula: Formula::NodeAtom("R".to_string()) };
        let result = run_query(&store, &query).unwrap();
        match result {
            QueryResult::MinimalConfigs(sets) => {
                let mut expected = IndexSet::new();
                expected.insert("PL".to_string());
                let mut expected2 = IndexSet::new();
                expected2.insert("DD".to_string());
                assert_eq!(sets.len(), 2);
                assert!(sets.contains(&expected));
                assert!(sets.contains(&expected2));
            }
            _ => panic!("expected a minimal-configs result"),
        }
    }
}
