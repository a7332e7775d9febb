//! In-house reduced, ordered, array-encoded BDD engine, used instead of an external decision
//! diagram crate.
//!
//! §9's Design Notes explicitly sanction this: "Implementations may instead use a BDD layer
//! without complemented edges, but then all DFS/probability code simplifies accordingly." Nodes
//! are stored in a flat table (terminals at the fixed indices 0/1, new nodes appended as built,
//! never reordered), following the array/unique-table shape used throughout the pack's own
//! from-scratch BDD packages rather than any complement-edge design — there is no `negated` bit
//! anywhere in this module, so every `complement` in [`crate::traversal`]/[`crate::prob`] is a
//! caller-tracked XOR accumulator, not a property of a node reference.
use std::collections::HashMap;
use std::fmt;

/// A variable's rank in the global declaration order (§3 "Variable universe": OP < F < A). The
/// BDD reduction rule relies on this being a dense `0..n` range assigned in declaration order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct VarId(pub u32);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum VarCategory {
    ObjectProperty,
    Fault,
    Attack,
}

/// A reference into a [`BddManager`]'s node table. `0` and `1` are the constant terminals.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BddPtr(pub u32);

impl BddPtr {
    pub const FALSE: BddPtr = BddPtr(0);
    pub const TRUE: BddPtr = BddPtr(1);
}

impl fmt::Display for BddPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct BddNode {
    var: VarId,
    low: BddPtr,
    high: BddPtr,
}

/// Owns the node table and variable declarations for a single query (§3 "Lifecycle": "A BDD
/// manager is created per Layer 2/3 query ... for Layer 1, a fresh manager per formula is
/// acceptable").
pub struct BddManager {
    nodes: Vec<BddNode>,
    unique: HashMap<(VarId, BddPtr, BddPtr), BddPtr>,
    var_names: Vec<String>,
    var_categories: Vec<VarCategory>,
    name_to_var: HashMap<String, VarId>,
}

impl Default for BddManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BddManager {
    pub fn new() -> Self {
        BddManager {
            // index 0 = FALSE, index 1 = TRUE; var/low/high on terminals are never read.
            nodes: vec![
                BddNode { var: VarId(u32::MAX), low: BddPtr::FALSE, high: BddPtr::FALSE },
                BddNode { var: VarId(u32::MAX), low: BddPtr::TRUE, high: BddPtr::TRUE },
            ],
            unique: HashMap::new(),
            var_names: Vec::new(),
            var_categories: Vec::new(),
            name_to_var: HashMap::new(),
        }
    }

    /// Declares a fresh variable at the next available rank. Callers must declare OP vars, then
    /// F vars, then A vars, in that order (§3, §4.3) — the manager does not reorder or check
    /// this itself, it trusts the compiler's declaration sequence.
    pub fn declare_var(&mut self, name: &str, category: VarCategory) -> VarId {
        if let Some(v) = self.name_to_var.get(name) {
            return *v;
        }
        let id = VarId(self.var_names.len() as u32);
        self.var_names.push(name.to_string());
        self.var_categories.push(category);
        self.name_to_var.insert(name.to_string(), id);
        id
    }

    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.name_to_var.get(name).copied()
    }

    pub fn var_name(&self, v: VarId) -> &str {
        &self.var_names[v.0 as usize]
    }

    pub fn category(&self, v: VarId) -> VarCategory {
        self.var_categories[v.0 as usize]
    }

    pub fn is_false(&self, p: BddPtr) -> bool {
        p == BddPtr::FALSE
    }

    pub fn is_true(&self, p: BddPtr) -> bool {
        p == BddPtr::TRUE
    }

    pub fn is_terminal(&self, p: BddPtr) -> bool {
        p == BddPtr::FALSE || p == BddPtr::TRUE
    }

    pub fn mk_false(&self) -> BddPtr {
        BddPtr::FALSE
    }

    pub fn mk_true(&self) -> BddPtr {
        BddPtr::TRUE
    }

    pub fn mk_const(&self, b: bool) -> BddPtr {
        if b {
            BddPtr::TRUE
        } else {
            BddPtr::FALSE
        }
    }

    /// Variable of an internal node, `None` for a terminal (§3's required node operation).
    pub fn var_of(&self, p: BddPtr) -> Option<VarId> {
        if self.is_terminal(p) {
            None
        } else {
            Some(self.nodes[p.0 as usize].var)
        }
    }

    pub fn low_of(&self, p: BddPtr) -> BddPtr {
        self.nodes[p.0 as usize].low
    }

    pub fn high_of(&self, p: BddPtr) -> BddPtr {
        self.nodes[p.0 as usize].high
    }

    /// Builds (or reuses) the node `var ? high : low`, applying the single reduction rule: a
    /// node whose children are identical is redundant and collapses to that child.
    fn mk_node(&mut self, var: VarId, low: BddPtr, high: BddPtr) -> BddPtr {
        if low == high {
            return low;
        }
        if let Some(&existing) = self.unique.get(&(var, low, high)) {
            return existing;
        }
        let ptr = BddPtr(self.nodes.len() as u32);
        self.nodes.push(BddNode { var, low, high });
        self.unique.insert((var, low, high), ptr);
        ptr
    }

    pub fn mk_var(&mut self, v: VarId) -> BddPtr {
        self.mk_node(v, BddPtr::FALSE, BddPtr::TRUE)
    }

    pub fn mk_not_var(&mut self, v: VarId) -> BddPtr {
        self.mk_node(v, BddPtr::TRUE, BddPtr::FALSE)
    }

    pub fn ite(&mut self, cond: BddPtr, then_: BddPtr, else_: BddPtr) -> BddPtr {
        let a = self.and(cond, then_);
        let not_cond = self.not(cond);
        let b = self.and(not_cond, else_);
        self.or(a, b)
    }

    pub fn not(&mut self, f: BddPtr) -> BddPtr {
        let mut memo = HashMap::new();
        self.not_rec(f, &mut memo)
    }

    fn not_rec(&mut self, f: BddPtr, memo: &mut HashMap<BddPtr, BddPtr>) -> BddPtr {
        if self.is_true(f) {
            return BddPtr::FALSE;
        }
        if self.is_false(f) {
            return BddPtr::TRUE;
        }
        if let Some(&cached) = memo.get(&f) {
            return cached;
        }
        let node = self.nodes[f.0 as usize];
        let lo = self.not_rec(node.low, memo);
        let hi = self.not_rec(node.high, memo);
        let out = self.mk_node(node.var, lo, hi);
        memo.insert(f, out);
        out
    }

    pub fn and(&mut self, a: BddPtr, b: BddPtr) -> BddPtr {
        let mut memo = HashMap::new();
        self.apply_rec(BoolOp::And, a, b, &mut memo)
    }

    pub fn or(&mut self, a: BddPtr, b: BddPtr) -> BddPtr {
        let mut memo = HashMap::new();
        self.apply_rec(BoolOp::Or, a, b, &mut memo)
    }

    pub fn xor(&mut self, a: BddPtr, b: BddPtr) -> BddPtr {
        let mut memo = HashMap::new();
        self.apply_rec(BoolOp::Xor, a, b, &mut memo)
    }

    pub fn imp(&mut self, a: BddPtr, b: BddPtr) -> BddPtr {
        let not_a = self.not(a);
        self.or(not_a, b)
    }

    pub fn iff(&mut self, a: BddPtr, b: BddPtr) -> BddPtr {
        let x = self.xor(a, b);
        self.not(x)
    }

    fn apply_rec(
        &mut self,
        op: BoolOp,
        a: BddPtr,
        b: BddPtr,
        memo: &mut HashMap<(BoolOp, BddPtr, BddPtr), BddPtr>,
    ) -> BddPtr {
        if self.is_terminal(a) && self.is_terminal(b) {
            let av = self.is_true(a);
            let bv = self.is_true(b);
            return self.mk_const(op.eval(av, bv));
        }
        let key = (op, a, b);
        if let Some(&cached) = memo.get(&key) {
            return cached;
        }
        let top = match (self.var_of(a), self.var_of(b)) {
            (Some(va), Some(vb)) => va.min(vb),
            (Some(va), None) => va,
            (None, Some(vb)) => vb,
            (None, None) => unreachable!("handled by the terminal case above"),
        };
        let (a_lo, a_hi) = self.cofactors(a, top);
        let (b_lo, b_hi) = self.cofactors(b, top);
        let lo = self.apply_rec(op, a_lo, b_lo, memo);
        let hi = self.apply_rec(op, a_hi, b_hi, memo);
        let out = self.mk_node(top, lo, hi);
        memo.insert(key, out);
        out
    }

    /// `(low, high)` cofactors of `f` with respect to `var`: if `f` doesn't branch on `var` (a
    /// terminal, or an internal node for a strictly later variable), both cofactors equal `f`.
    fn cofactors(&self, f: BddPtr, var: VarId) -> (BddPtr, BddPtr) {
        match self.var_of(f) {
            Some(v) if v == var => (self.low_of(f), self.high_of(f)),
            _ => (f, f),
        }
    }

    /// Sets `var` to `value` throughout `f` (§4.3 step 3's `manager.let`, and the substitution
    /// step of `MRS`, §4.3 step 3). Because the order is fixed, a node whose variable strictly
    /// precedes `var` is rebuilt recursively; a node whose variable strictly follows `var` cannot
    /// mention it at all (variables only increase going down), so it is returned unchanged.
    pub fn restrict(&mut self, f: BddPtr, var: VarId, value: bool) -> BddPtr {
        let mut memo = HashMap::new();
        self.restrict_rec(f, var, value, &mut memo)
    }

    fn restrict_rec(
        &mut self,
        f: BddPtr,
        var: VarId,
        value: bool,
        memo: &mut HashMap<BddPtr, BddPtr>,
    ) -> BddPtr {
        let node_var = match self.var_of(f) {
            None => return f,
            Some(v) => v,
        };
        if node_var > var {
            return f;
        }
        if node_var == var {
            return if value { self.high_of(f) } else { self.low_of(f) };
        }
        if let Some(&cached) = memo.get(&f) {
            return cached;
        }
        let node = self.nodes[f.0 as usize];
        let lo = self.restrict_rec(node.low, var, value, memo);
        let hi = self.restrict_rec(node.high, var, value, memo);
        let out = self.mk_node(node.var, lo, hi);
        memo.insert(f, out);
        out
    }

    /// Substitutes `var` for a fresh `new_var` throughout `f` (MRS step 3's priming), built from
    /// `restrict`/`and`/`or` only, matching the minimal primitive surface of the fallback BDD
    /// layer described in §9.
    pub fn subst_var(&mut self, f: BddPtr, var: VarId, new_var: VarId) -> BddPtr {
        let pos = self.restrict(f, var, true);
        let neg = self.restrict(f, var, false);
        let new_var_bdd = self.mk_var(new_var);
        let not_new_var = self.mk_not_var(new_var);
        let a = self.and(pos, new_var_bdd);
        let b = self.and(neg, not_new_var);
        self.or(a, b)
    }

    /// Existentially quantifies `var` out of `f`: `restrict(f,true) || restrict(f,false)`.
    pub fn exists(&mut self, f: BddPtr, var: VarId) -> BddPtr {
        let pos = self.restrict(f, var, true);
        let neg = self.restrict(f, var, false);
        self.or(pos, neg)
    }

    /// Whether `var` appears anywhere in `f`'s support.
    pub fn var_exists(&self, f: BddPtr, var: VarId) -> bool {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![f];
        while let Some(p) = stack.pop() {
            if !seen.insert(p) {
                continue;
            }
            match self.var_of(p) {
                None => {}
                Some(v) if v == var => return true,
                Some(v) if v > var => {}
                Some(_) => {
                    stack.push(self.low_of(p));
                    stack.push(self.high_of(p));
                }
            }
        }
        false
    }

    /// The full set of variables `f` branches on.
    pub fn support(&self, f: BddPtr) -> std::collections::BTreeSet<VarId> {
        let mut acc = std::collections::BTreeSet::new();
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![f];
        while let Some(p) = stack.pop() {
            if !seen.insert(p) {
                continue;
            }
            if let Some(v) = self.var_of(p) {
                acc.insert(v);
                stack.push(self.low_of(p));
                stack.push(self.high_of(p));
            }
        }
        acc
    }

    /// All nodes reachable from `f`, sorted ascending by pointer index. Because every node's
    /// children are built before the node itself (`mk_node` only ever appends), child pointers
    /// are always numerically smaller than their parent's — so ascending-index order is already
    /// a valid reverse-topological (children-before-parents) order. This is what lets C4's
    /// "whole-BDD traversal" degenerate to a direct array scan, and arbitrary-root traversal
    /// degenerate to "collect reachable, then sort".
    pub fn reachable_sorted(&self, f: BddPtr) -> Vec<BddPtr> {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![f];
        let mut out = Vec::new();
        while let Some(p) = stack.pop() {
            if !seen.insert(p) {
                continue;
            }
            out.push(p);
            if !self.is_terminal(p) {
                stack.push(self.low_of(p));
                stack.push(self.high_of(p));
            }
        }
        out.sort();
        out
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
enum BoolOp {
    And,
    Or,
    Xor,
}

impl BoolOp {
    fn eval(self, a: bool, b: bool) -> bool {
        match self {
            BoolOp::And => a && b,
            BoolOp::Or => a || b,
            BoolOp::Xor => a != b,
        }
    }
}
