//! In-house ADD/MTBDD engine for the risk MTBDDs of C6 (§4.6), built the same way as
//! [`crate::bdd`]'s BDD engine — a flat, reduced, ordered node table — but with `Rational`
//! terminals instead of the two boolean constants.
use crate::bdd::VarId;
use crate::rational::Rational;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AddPtr(pub u32);

enum AddEntry {
    Terminal(Rational),
    Internal { var: VarId, low: AddPtr, high: AddPtr },
}

pub struct AddManager {
    entries: Vec<AddEntry>,
    terminal_cache: HashMap<Rational, AddPtr>,
    unique: HashMap<(VarId, AddPtr, AddPtr), AddPtr>,
}

impl Default for AddManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AddManager {
    pub fn new() -> Self {
        AddManager { entries: Vec::new(), terminal_cache: HashMap::new(), unique: HashMap::new() }
    }

    pub fn mk_terminal(&mut self, value: Rational) -> AddPtr {
        if let Some(&p) = self.terminal_cache.get(&value) {
            return p;
        }
        let ptr = AddPtr(self.entries.len() as u32);
        self.terminal_cache.insert(value.clone(), ptr);
        self.entries.push(AddEntry::Terminal(value));
        ptr
    }

    /// Builds (or reuses) `var ? high : low`.
    pub fn branch(&mut self, var: VarId, low: AddPtr, high: AddPtr) -> AddPtr {
        if low == high {
            return low;
        }
        if let Some(&p) = self.unique.get(&(var, low, high)) {
            return p;
        }
        let ptr = AddPtr(self.entries.len() as u32);
        self.unique.insert((var, low, high), ptr);
        self.entries.push(AddEntry::Internal { var, low, high });
        ptr
    }

    pub fn is_terminal(&self, p: AddPtr) -> bool {
        matches!(self.entries[p.0 as usize], AddEntry::Terminal(_))
    }

    pub fn terminal_value(&self, p: AddPtr) -> Option<&Rational> {
        match &self.entries[p.0 as usize] {
            AddEntry::Terminal(v) => Some(v),
            AddEntry::Internal { .. } => None,
        }
    }

    pub fn var_of(&self, p: AddPtr) -> Option<VarId> {
        match &self.entries[p.0 as usize] {
            AddEntry::Terminal(_) => None,
            AddEntry::Internal { var, .. } => Some(*var),
        }
    }

    pub fn low_of(&self, p: AddPtr) -> AddPtr {
        match &self.entries[p.0 as usize] {
            AddEntry::Internal { low, .. } => *low,
            AddEntry::Terminal(_) => p,
        }
    }

    pub fn high_of(&self, p: AddPtr) -> AddPtr {
        match &self.entries[p.0 as usize] {
            AddEntry::Internal { high, .. } => *high,
            AddEntry::Terminal(_) => p,
        }
    }

    fn cofactors(&self, f: AddPtr, var: VarId) -> (AddPtr, AddPtr) {
        match self.var_of(f) {
            Some(v) if v == var => (self.low_of(f), self.high_of(f)),
            _ => (f, f),
        }
    }

    /// Pointwise sum of two ADDs (§4.6's "Sum (ADD apply `+`)" for per-object risk aggregation).
    pub fn add(&mut self, a: AddPtr, b: AddPtr) -> AddPtr {
        let mut memo = HashMap::new();
        self.add_rec(a, b, &mut memo)
    }

    fn add_rec(&mut self, a: AddPtr, b: AddPtr, memo: &mut HashMap<(AddPtr, AddPtr), AddPtr>) -> AddPtr {
        if self.is_terminal(a) && self.is_terminal(b) {
            let sum = self.terminal_value(a).unwrap().clone() + self.terminal_value(b).unwrap().clone();
            return self.mk_terminal(sum);
        }
        if let Some(&cached) = memo.get(&(a, b)) {
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
        let lo = self.add_rec(a_lo, b_lo, memo);
        let hi = self.add_rec(a_hi, b_hi, memo);
        let out = self.branch(top, lo, hi);
        memo.insert((a, b), out);
        out
    }

    /// Every node reachable from `f`, sorted ascending by pointer (children-before-parents, same
    /// argument as [`crate::bdd::BddManager::reachable_sorted`]: children are always built, and
    /// therefore indexed, before their parent).
    pub fn reachable_sorted(&self, f: AddPtr) -> Vec<AddPtr> {
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

    /// Terminal leaf values reachable from `f`, each distinct terminal node counted once (§4.6's
    /// `total_risk`: "traverse its terminals (a DFS yielding leaf values)").
    pub fn terminal_values(&self, f: AddPtr) -> Vec<Rational> {
        self.reachable_sorted(f)
            .into_iter()
            .filter_map(|p| self.terminal_value(p).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational;

    #[test]
    fn sum_of_two_constant_adds_is_pointwise() {
        let mut m = AddManager::new();
        let a = m.mk_terminal(rational::parse_rational("0.1").unwrap());
        let b = m.mk_terminal(rational::parse_rational("0.2").unwrap());
        let sum = m.add(a, b);
        assert_eq!(*m.terminal_value(sum).unwrap(), rational::parse_rational("0.3").unwrap());
    }

    #[test]
    fn branch_collapses_identical_children() {
        let mut m = AddManager::new();
        let t = m.mk_terminal(rational::one());
        let collapsed = m.branch(VarId(0), t, t);
        assert_eq!(collapsed, t);
    }
}
