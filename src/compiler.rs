//! C3: lowers a formula AST (plus the variable sets C2 collected) into a BDD.
use crate::ast::{CondExpr, Formula};
use crate::bdd::{BddManager, BddPtr, VarCategory, VarId};
use crate::descent::VarUsage;
use crate::error::{DflError, DflResult};
use crate::evidence::EvidenceFrame;
use crate::model::{ModelStore, NameKind, TreeKind};

/// Declares every variable `usage` names, in OP → F → A order (§3, §4.3's "operating contract").
pub fn declare_variables(manager: &mut BddManager, usage: &VarUsage) {
    for name in &usage.op_vars {
        manager.declare_var(name, VarCategory::ObjectProperty);
    }
    for name in &usage.fault_vars {
        manager.declare_var(name, VarCategory::Fault);
    }
    for name in &usage.attack_vars {
        manager.declare_var(name, VarCategory::Attack);
    }
}

pub struct Compiler<'a> {
    store: &'a ModelStore,
    manager: &'a mut BddManager,
    frames: Vec<EvidenceFrame>,
    prime_counter: u32,
}

impl<'a> Compiler<'a> {
    pub fn new(store: &'a ModelStore, manager: &'a mut BddManager) -> Self {
        Compiler { store, manager, frames: Vec::new(), prime_counter: 0 }
    }

    pub fn compile(&mut self, formula: &Formula) -> DflResult<BddPtr> {
        match formula {
            Formula::Const(b) => Ok(self.manager.mk_const(*b)),
            Formula::NodeAtom(name) => self.compile_atom(name),
            Formula::Not(a) => {
                let a = self.compile(a)?;
                Ok(self.manager.not(a))
            }
            Formula::And(a, b) => self.binop(a, b, |m, x, y| m.and(x, y)),
            Formula::Or(a, b) => self.binop(a, b, |m, x, y| m.or(x, y)),
            Formula::Imp(a, b) => self.binop(a, b, |m, x, y| m.imp(x, y)),
            Formula::Iff(a, b) => self.binop(a, b, |m, x, y| m.iff(x, y)),
            Formula::Xor(a, b) => self.binop(a, b, |m, x, y| m.xor(x, y)),
            Formula::WithBooleanEvidence(a, map) => self.compile_with_evidence(a, map),
            Formula::Mrs(a) => {
                let phi = self.compile(a)?;
                Ok(self.minimize(phi))
            }
        }
    }

    fn binop(
        &mut self,
        a: &Formula,
        b: &Formula,
        f: impl Fn(&mut BddManager, BddPtr, BddPtr) -> BddPtr,
    ) -> DflResult<BddPtr> {
        let a = self.compile(a)?;
        let b = self.compile(b)?;
        Ok(f(self.manager, a, b))
    }

    fn compile_with_evidence(
        &mut self,
        sub: &Formula,
        map: &crate::ast::BoolEvidence,
    ) -> DflResult<BddPtr> {
        self.frames.push(EvidenceFrame { blacklist: std::collections::HashMap::new(), values: map.clone() });
        let compiled = self.compile(sub);
        self.frames.pop();
        let mut result = compiled?;

        // §4.3 step 3: eliminate lingering occurrences of evidence-targeted variables that a
        // subtree compiled elsewhere in the formula may share (e.g. a sibling reference to the
        // same basic node or object property named in `map`).
        for (name, value) in map {
            if let Some(var) = self.manager.var_by_name(name) {
                result = self.manager.restrict(result, var, *value);
            }
        }
        Ok(result)
    }

    /// `node_atom(x)` and gate-child references share this single entry point, since an evidence
    /// override applies identically whether `x` was written explicitly in the formula or reached
    /// as an intermediate node's gate child (§4.3's atom rule makes no distinction).
    fn compile_atom(&mut self, name: &str) -> DflResult<BddPtr> {
        if let Some(v) = EvidenceFrame::lookup(&self.frames, name) {
            return Ok(self.manager.mk_const(v));
        }
        match self.store.resolve_name(name) {
            Some(NameKind::ObjectProperty) => {
                let var = self
                    .manager
                    .var_by_name(name)
                    .ok_or_else(|| DflError::UnknownNode(name.to_string()))?;
                Ok(self.manager.mk_var(var))
            }
            Some(NameKind::AttackNode) => self.compile_tree_atom(TreeKind::Attack, name),
            Some(NameKind::FaultNode) => self.compile_tree_atom(TreeKind::Fault, name),
            None => Err(DflError::UnknownNode(name.to_string())),
        }
    }

    fn compile_tree_atom(&mut self, kind: TreeKind, name: &str) -> DflResult<BddPtr> {
        let tree = self.store.tree(kind);
        let node = tree.get(name).ok_or_else(|| DflError::UnknownNode(name.to_string()))?;
        let cond = node.cond.clone();

        let base = if node.is_basic() {
            let var = self
                .manager
                .var_by_name(name)
                .ok_or_else(|| DflError::UnknownNode(name.to_string()))?;
            self.manager.mk_var(var)
        } else {
            let gate = node.gate.clone().expect("intermediate node always has a gate");
            let mut children = gate.children.iter();
            let first = children.next().expect("a gate declares at least one child");
            let mut combined = self.compile_atom(first)?;
            // Single-child gates skip the spurious combinator (§4.3: "the parser allows
            // intermediate nodes whose only distinguishing feature is a gate annotation with one
            // subchild").
            for child in children {
                let next = self.compile_atom(child)?;
                combined = match gate.kind {
                    crate::model::GateKind::And => self.manager.and(combined, next),
                    crate::model::GateKind::Or => self.manager.or(combined, next),
                };
            }
            combined
        };

        match cond {
            Some(c) => {
                let cond_bdd = self.compile_cond(&c)?;
                Ok(self.manager.and(base, cond_bdd))
            }
            None => Ok(base),
        }
    }

    fn compile_cond(&mut self, cond: &CondExpr) -> DflResult<BddPtr> {
        match cond {
            CondExpr::Const(b) => Ok(self.manager.mk_const(*b)),
            CondExpr::Prop(name) => {
                if let Some(v) = EvidenceFrame::lookup(&self.frames, name) {
                    return Ok(self.manager.mk_const(v));
                }
                let var = self
                    .manager
                    .var_by_name(name)
                    .ok_or_else(|| DflError::UnknownNode(name.to_string()))?;
                Ok(self.manager.mk_var(var))
            }
            CondExpr::Not(a) => {
                let a = self.compile_cond(a)?;
                Ok(self.manager.not(a))
            }
            CondExpr::And(a, b) => self.cond_binop(a, b, |m, x, y| m.and(x, y)),
            CondExpr::Or(a, b) => self.cond_binop(a, b, |m, x, y| m.or(x, y)),
            CondExpr::Imp(a, b) => self.cond_binop(a, b, |m, x, y| m.imp(x, y)),
            CondExpr::Iff(a, b) => self.cond_binop(a, b, |m, x, y| m.iff(x, y)),
            CondExpr::Xor(a, b) => self.cond_binop(a, b, |m, x, y| m.xor(x, y)),
        }
    }

    fn cond_binop(
        &mut self,
        a: &CondExpr,
        b: &CondExpr,
        f: impl Fn(&mut BddManager, BddPtr, BddPtr) -> BddPtr,
    ) -> DflResult<BddPtr> {
        let a = self.compile_cond(a)?;
        let b = self.compile_cond(b)?;
        Ok(f(self.manager, a, b))
    }

    /// `MRS`/minimal-configuration machinery (§4.3). Exposed at the `Compiler` level so
    /// `minimal_assignments_bdd` below can be reused for Layer 1's "enumerate the minimal
    /// configurations" mode, parameterized over the formula's event variables with object
    /// properties already pinned by the caller's configuration (see `query::eval_minimal_configs`).
    fn minimize(&mut self, phi: BddPtr) -> BddPtr {
        self.prime_counter += 1;
        let counter = self.prime_counter;
        let support = self.manager.support(phi);
        let vars: Vec<VarId> = support
            .into_iter()
            .filter(|v| self.manager.category(*v) != VarCategory::ObjectProperty)
            .collect();
        minimal_assignments_bdd(self.manager, phi, &vars, counter)
    }
}

/// The ⊆-minimality construction behind `MRS` (§4.3 steps 2–5), generalized to any variable set
/// `vars` to minimize over — used both for event-variable minimality (`MRS`) and, with `vars` set
/// to the formula's attack/fault event variables again, for Layer 1's minimal-satisfying-
/// configuration mode (object properties there are pinned by the caller's configuration instead
/// of being part of the variable set minimized over).
pub fn minimal_assignments_bdd(
    manager: &mut BddManager,
    phi: BddPtr,
    vars: &[VarId],
    unique_suffix: u32,
) -> BddPtr {
    if vars.is_empty() {
        return phi;
    }
    let mut primed = Vec::with_capacity(vars.len());
    let mut phi_prime = phi;
    for &v in vars {
        let cat = manager.category(v);
        let prime_name = format!("{}#mrs{unique_suffix}", manager.var_name(v));
        let v_prime = manager.declare_var(&prime_name, cat);
        phi_prime = manager.subst_var(phi_prime, v, v_prime);
        primed.push((v, v_prime));
    }

    let mut sigma_and = manager.mk_true();
    let mut sigma_or = manager.mk_false();
    for &(v, v_prime) in &primed {
        let vb = manager.mk_var(v);
        let vpb = manager.mk_var(v_prime);
        let imp = manager.imp(vpb, vb);
        sigma_and = manager.and(sigma_and, imp);
        let xor = manager.xor(vpb, vb);
        sigma_or = manager.or(sigma_or, xor);
    }
    let sigma = manager.and(sigma_and, sigma_or);

    let mut witness = manager.and(sigma, phi_prime);
    for &(_, v_prime) in &primed {
        witness = manager.exists(witness, v_prime);
    }
    let not_witness = manager.not(witness);
    manager.and(phi, not_witness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::{Gate, GateKind, TreeNode};
    use crate::model::{DisruptionTree, ObjectGraph};
    use indexmap::{IndexMap, IndexSet};

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

    fn or_store() -> ModelStore {
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
    fn mrs_excludes_the_non_minimal_both_true_assignment() {
        let store = or_store();
        let mut manager = BddManager::new();
        let formula = Formula::Mrs(Box::new(Formula::NodeAtom("R".to_string())));
        let usage = crate::descent::descend(&store, &Formula::NodeAtom("R".to_string())).unwrap();
        declare_variables(&mut manager, &usage);
        let mut compiler = Compiler::new(&store, &mut manager);
        let mrs_bdd = compiler.compile(&formula).unwrap();

        let a = manager.var_by_name("a").unwrap();
        let b = manager.var_by_name("b").unwrap();
        // {a, b} both true must NOT satisfy MRS(a || b): it is not ⊆-minimal.
        let both_true = manager.restrict(manager.restrict(mrs_bdd, a, true), b, true);
        assert_eq!(both_true, BddPtr::FALSE);
        // {a} alone must satisfy it.
        let a_only = manager.restrict(manager.restrict(mrs_bdd, a, true), b, false);
        assert_eq!(a_only, BddPtr::TRUE);
    }
}
