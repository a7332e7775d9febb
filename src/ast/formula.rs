//! The query-formula language: node atoms, boolean connectives, scoped boolean/probabilistic
//! evidence, and the `MRS` minimal-risk-scenarios operator (§4.3), plus the Layer 2/3 query
//! shapes that wrap it (§6).
use crate::rational::Rational;
use indexmap::IndexMap;
use std::fmt;

/// A single evidence scope: `[x:1, y:0, ...]` (boolean) or `[x=0.8, ...]` (probabilistic).
/// `IndexMap` keeps declaration order for display and for the duplicate-key check in §4.2
/// ("duplicate keys in a single scope are not permitted" — checked by the parser before this
/// map is ever built, so by the time it reaches the descent/compiler it is already unique).
pub type BoolEvidence = IndexMap<String, bool>;
pub type ProbEvidence = IndexMap<String, Rational>;

#[derive(Clone, Debug, PartialEq)]
pub enum Formula {
    NodeAtom(String),
    Const(bool),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Imp(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
    Xor(Box<Formula>, Box<Formula>),
    WithBooleanEvidence(Box<Formula>, BoolEvidence),
    Mrs(Box<Formula>),
}

impl Formula {
    pub fn mk_not(a: Formula) -> Formula {
        Formula::Not(Box::new(a))
    }
    pub fn mk_and(a: Formula, b: Formula) -> Formula {
        Formula::And(Box::new(a), Box::new(b))
    }
    pub fn mk_or(a: Formula, b: Formula) -> Formula {
        Formula::Or(Box::new(a), Box::new(b))
    }
    pub fn mk_imp(a: Formula, b: Formula) -> Formula {
        Formula::Imp(Box::new(a), Box::new(b))
    }
    pub fn mk_iff(a: Formula, b: Formula) -> Formula {
        Formula::Iff(Box::new(a), Box::new(b))
    }
    pub fn mk_xor(a: Formula, b: Formula) -> Formula {
        Formula::Xor(Box::new(a), Box::new(b))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::NodeAtom(name) => write!(f, "{name}"),
            Formula::Const(true) => write!(f, "1"),
            Formula::Const(false) => write!(f, "0"),
            Formula::Not(a) => write!(f, "!{a}"),
            Formula::And(a, b) => write!(f, "({a} && {b})"),
            Formula::Or(a, b) => write!(f, "({a} || {b})"),
            Formula::Imp(a, b) => write!(f, "({a} => {b})"),
            Formula::Iff(a, b) => write!(f, "({a} == {b})"),
            Formula::Xor(a, b) => write!(f, "({a} != {b})"),
            Formula::WithBooleanEvidence(a, ev) => {
                write!(f, "{a}[")?;
                for (i, (k, v)) in ev.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}:{}", if *v { 1 } else { 0 })?;
                }
                write!(f, "]")
            }
            Formula::Mrs(a) => write!(f, "MRS({a})"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CmpOp {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn holds(&self, lhs: &Rational, rhs: &Rational) -> bool {
        match self {
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Lt => "<",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        };
        write!(f, "{s}")
    }
}

/// A single `P(f) <op> <rational>` assertion, the atom of the Layer 2 grammar. Probability
/// evidence visible at a comparison is resolved by [`crate::descent`] from the enclosing
/// [`Layer2Expr::WithProbabilityEvidence`] frames (inner shadows outer), composed once per
/// comparison before evaluation — the comparison itself never carries an "already composed" map,
/// only the local bracket it was written with, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbComparison {
    pub formula: Formula,
    pub op: CmpOp,
    pub threshold: Rational,
    /// Evidence written directly on this comparison via a trailing `[...]` in the grammar; sugar
    /// for wrapping just this comparison in `WithProbabilityEvidence`.
    pub local_evidence: ProbEvidence,
}

/// Boolean combination of probability comparisons (S6: `(P(x) >= 0.3 [x=0.8]) && (P(x) < 0.7
/// [x=0.2])`), each evaluated independently before being combined as ordinary booleans.
#[derive(Clone, Debug, PartialEq)]
pub enum Layer2Expr {
    Compare(ProbComparison),
    Not(Box<Layer2Expr>),
    And(Box<Layer2Expr>, Box<Layer2Expr>),
    Or(Box<Layer2Expr>, Box<Layer2Expr>),
    Imp(Box<Layer2Expr>, Box<Layer2Expr>),
    Iff(Box<Layer2Expr>, Box<Layer2Expr>),
    Xor(Box<Layer2Expr>, Box<Layer2Expr>),
    WithProbabilityEvidence(Box<Layer2Expr>, ProbEvidence),
}

impl fmt::Display for Layer2Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer2Expr::Compare(cmp) => {
                write!(f, "P({}) {} {}", cmp.formula, cmp.op, cmp.threshold)?;
                fmt_evidence(f, &cmp.local_evidence)
            }
            Layer2Expr::Not(a) => write!(f, "!{a}"),
            Layer2Expr::And(a, b) => write!(f, "({a} && {b})"),
            Layer2Expr::Or(a, b) => write!(f, "({a} || {b})"),
            Layer2Expr::Imp(a, b) => write!(f, "({a} => {b})"),
            Layer2Expr::Iff(a, b) => write!(f, "({a} == {b})"),
            Layer2Expr::Xor(a, b) => write!(f, "({a} != {b})"),
            Layer2Expr::WithProbabilityEvidence(a, ev) => {
                write!(f, "{a}[")?;
                for (i, (k, v)) in ev.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn fmt_evidence(f: &mut fmt::Formatter<'_>, ev: &ProbEvidence) -> fmt::Result {
    if ev.is_empty() {
        return Ok(());
    }
    write!(f, "[")?;
    for (i, (k, v)) in ev.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{k}={v}")?;
    }
    write!(f, "]")
}

fn fmt_config(f: &mut fmt::Formatter<'_>, config: &IndexMap<String, bool>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in config.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{k}:{}", if *v { 1 } else { 0 })?;
    }
    write!(f, "}}")
}

fn fmt_bool_evidence(f: &mut fmt::Formatter<'_>, ev: &BoolEvidence) -> fmt::Result {
    if ev.is_empty() {
        return Ok(());
    }
    write!(f, "[")?;
    for (i, (k, v)) in ev.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{k}:{}", if *v { 1 } else { 0 })?;
    }
    write!(f, "]")
}

/// A fully parsed query, ready for [`crate::query::run_query`] (§6's three layers).
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    /// Layer 1 "check": is `formula` satisfied under a total assignment? `config` must name every
    /// variable the formula uses, object properties and attack/fault basics alike — Layer 1 has no
    /// probabilistic or adversarial reading of a basic event the way Layer 2/3 do, so it is just
    /// another boolean the caller must supply (see DESIGN.md).
    Boolean {
        config: IndexMap<String, bool>,
        formula: Formula,
    },
    /// Layer 1 "compute all": `{config} [[formula]]` enumerates the ⊆-minimal sets of attack/fault
    /// basics that satisfy `formula`; `config` only needs to cover the object properties it uses
    /// (see DESIGN.md).
    MinimalConfigs {
        config: IndexMap<String, bool>,
        formula: Formula,
    },
    /// Layer 2: attacker/fault-game probability compared against a threshold.
    Probability {
        config: IndexMap<String, bool>,
        expr: Layer2Expr,
    },
    MostRiskyAttack { object: String, evidence: BoolEvidence },
    MostRiskyFault { object: String, evidence: BoolEvidence },
    OptimalConf { object: String, evidence: BoolEvidence },
    MaxTotalRisk { object: String, evidence: BoolEvidence },
    MinTotalRisk { object: String, evidence: BoolEvidence },
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Boolean { config, formula } => {
                fmt_config(f, config)?;
                write!(f, " {formula}")
            }
            Query::MinimalConfigs { config, formula } => {
                fmt_config(f, config)?;
                write!(f, " [[{formula}]]")
            }
            Query::Probability { config, expr } => {
                fmt_config(f, config)?;
                write!(f, " {expr}")
            }
            Query::MostRiskyAttack { object, evidence } => {
                write!(f, "MostRiskyA({object})")?;
                fmt_bool_evidence(f, evidence)
            }
            Query::MostRiskyFault { object, evidence } => {
                write!(f, "MostRiskyF({object})")?;
                fmt_bool_evidence(f, evidence)
            }
            Query::OptimalConf { object, evidence } => {
                write!(f, "OptimalConf({object})")?;
                fmt_bool_evidence(f, evidence)
            }
            Query::MaxTotalRisk { object, evidence } => {
                write!(f, "MaxTotalRisk({object})")?;
                fmt_bool_evidence(f, evidence)
            }
            Query::MinTotalRisk { object, evidence } => {
                write!(f, "MinTotalRisk({object})")?;
                fmt_bool_evidence(f, evidence)
            }
        }
    }
}
