//! Boolean condition expressions: the formula language used by a node's `cond=(...)` clause
//! (§3 "Condition"), over object-property names only.
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum CondExpr {
    Const(bool),
    Prop(String),
    Not(Box<CondExpr>),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
    Imp(Box<CondExpr>, Box<CondExpr>),
    Iff(Box<CondExpr>, Box<CondExpr>),
    Xor(Box<CondExpr>, Box<CondExpr>),
}

impl CondExpr {
    /// Every object-property name this condition reads (§4.2's "node-condition's property set").
    pub fn properties(&self) -> BTreeSet<String> {
        let mut acc = BTreeSet::new();
        self.collect_properties(&mut acc);
        acc
    }

    fn collect_properties(&self, acc: &mut BTreeSet<String>) {
        match self {
            CondExpr::Const(_) => {}
            CondExpr::Prop(name) => {
                acc.insert(name.clone());
            }
            CondExpr::Not(a) => a.collect_properties(acc),
            CondExpr::And(a, b)
            | CondExpr::Or(a, b)
            | CondExpr::Imp(a, b)
            | CondExpr::Iff(a, b)
            | CondExpr::Xor(a, b) => {
                a.collect_properties(acc);
                b.collect_properties(acc);
            }
        }
    }
}

impl fmt::Display for CondExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CondExpr::Const(true) => write!(f, "1"),
            CondExpr::Const(false) => write!(f, "0"),
            CondExpr::Prop(name) => write!(f, "{name}"),
            CondExpr::Not(a) => write!(f, "!{a}"),
            CondExpr::And(a, b) => write!(f, "({a} && {b})"),
            CondExpr::Or(a, b) => write!(f, "({a} || {b})"),
            CondExpr::Imp(a, b) => write!(f, "({a} => {b})"),
            CondExpr::Iff(a, b) => write!(f, "({a} == {b})"),
            CondExpr::Xor(a, b) => write!(f, "({a} != {b})"),
        }
    }
}
