//! Recursive-descent parser for the query grammar (§6): `{config} formula;`,
//! `{config} P(f) <op> <rational> [evidence];`, and the five Layer 3 calls.
//!
//! Precedence, tightest to loosest (an implementer decision recorded in `SPEC_FULL.md`'s Open
//! Question resolutions, since §6 only pins down `!` binding tighter than the binaries and `=>`
//! being right-associative and loosest): `!`, `&&`, `||`, `==`/`!=`, `=>`. Mirrors the teacher's
//! `preprocessing::parser` precedence-ladder style (`parse_1_hybrid -> parse_2_iff -> ...`),
//! just over this grammar instead of HCTL's.
use super::tokenizer::{tokenize, Token};
use crate::ast::{BoolEvidence, CmpOp, Formula, Layer2Expr, ProbComparison, ProbEvidence, Query};
use crate::rational::parse_rational;
use indexmap::IndexMap;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, tok: &Token) -> Result<(), String> {
        match self.next() {
            Some(ref t) if t == tok => Ok(()),
            Some(other) => Err(format!("expected `{tok:?}`, found `{other:?}`")),
            None => Err(format!("expected `{tok:?}`, found end of input")),
        }
    }

    fn expect_ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(other) => Err(format!("expected an identifier, found `{other:?}`")),
            None => Err("expected an identifier, found end of input".to_string()),
        }
    }

    fn expect_number(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Token::Number(text)) => Ok(text),
            Some(other) => Err(format!("expected a number, found `{other:?}`")),
            None => Err("expected a number, found end of input".to_string()),
        }
    }

    fn at_ident_ci(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name.eq_ignore_ascii_case(word))
    }

    fn peek_is(&self, tok: &Token) -> bool {
        self.peek() == Some(tok)
    }

    // --- config / evidence maps ---

    fn parse_bool_bool(&mut self) -> Result<bool, String> {
        match self.expect_number()?.as_str() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(format!("expected `0` or `1`, found `{other}`")),
        }
    }

    fn parse_braced_config(&mut self) -> Result<IndexMap<String, bool>, String> {
        self.expect(&Token::LBrace)?;
        let mut map = IndexMap::new();
        if self.peek_is(&Token::RBrace) {
            self.next();
            return Ok(map);
        }
        loop {
            let name = self.expect_ident()?;
            self.expect(&Token::Colon)?;
            let value = self.parse_bool_bool()?;
            if map.insert(name.clone(), value).is_some() {
                return Err(format!("duplicate configuration key `{name}`"));
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBrace) => break,
                other => return Err(format!("expected `,` or `}}` in configuration, found `{other:?}`")),
            }
        }
        Ok(map)
    }

    fn parse_bracketed_bool_evidence(&mut self) -> Result<BoolEvidence, String> {
        self.expect(&Token::LBracket)?;
        let mut map = IndexMap::new();
        if self.peek_is(&Token::RBracket) {
            self.next();
            return Ok(map);
        }
        loop {
            let name = self.expect_ident()?;
            self.expect(&Token::Colon)?;
            let value = self.parse_bool_bool()?;
            if map.insert(name.clone(), value).is_some() {
                return Err(format!("duplicate evidence key `{name}` in a single scope"));
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                other => return Err(format!("expected `,` or `]` in evidence, found `{other:?}`")),
            }
        }
        Ok(map)
    }

    fn parse_bracketed_prob_evidence(&mut self) -> Result<ProbEvidence, String> {
        self.expect(&Token::LBracket)?;
        let mut map = IndexMap::new();
        if self.peek_is(&Token::RBracket) {
            self.next();
            return Ok(map);
        }
        loop {
            let name = self.expect_ident()?;
            self.expect(&Token::Equals)?;
            let text = self.expect_number()?;
            let value = parse_rational(&text)?;
            if map.insert(name.clone(), value).is_some() {
                return Err(format!("duplicate evidence key `{name}` in a single scope"));
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                other => return Err(format!("expected `,` or `]` in evidence, found `{other:?}`")),
            }
        }
        Ok(map)
    }

    // --- formula (boolean) grammar ---

    fn parse_formula_imp(&mut self) -> Result<Formula, String> {
        let left = self.parse_formula_eq()?;
        if self.peek_is(&Token::FatArrow) {
            self.next();
            let right = self.parse_formula_imp()?;
            Ok(Formula::mk_imp(left, right))
        } else {
            Ok(left)
        }
    }

    fn parse_formula_eq(&mut self) -> Result<Formula, String> {
        let mut left = self.parse_formula_or()?;
        loop {
            match self.peek() {
                Some(Token::EqEq) => {
                    self.next();
                    let right = self.parse_formula_or()?;
                    left = Formula::mk_iff(left, right);
                }
                Some(Token::NotEq) => {
                    self.next();
                    let right = self.parse_formula_or()?;
                    left = Formula::mk_xor(left, right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_formula_or(&mut self) -> Result<Formula, String> {
        let mut left = self.parse_formula_and()?;
        while self.peek_is(&Token::OrOr) {
            self.next();
            let right = self.parse_formula_and()?;
            left = Formula::mk_or(left, right);
        }
        Ok(left)
    }

    fn parse_formula_and(&mut self) -> Result<Formula, String> {
        let mut left = self.parse_formula_not()?;
        while self.peek_is(&Token::AndAnd) {
            self.next();
            let right = self.parse_formula_not()?;
            left = Formula::mk_and(left, right);
        }
        Ok(left)
    }

    fn parse_formula_not(&mut self) -> Result<Formula, String> {
        if self.peek_is(&Token::Bang) {
            self.next();
            let inner = self.parse_formula_not()?;
            Ok(Formula::mk_not(inner))
        } else {
            self.parse_formula_postfix()
        }
    }

    /// A primary formula followed by zero or more `[x:1, ...]` brackets, each wrapping the
    /// formula parsed so far — the leftmost bracket binds directly to the atom (innermost scope,
    /// shadowing any outer bracket), later brackets wrap outward.
    fn parse_formula_postfix(&mut self) -> Result<Formula, String> {
        let mut result = self.parse_formula_primary()?;
        while self.peek_is(&Token::LBracket) {
            let evidence = self.parse_bracketed_bool_evidence()?;
            result = Formula::WithBooleanEvidence(Box::new(result), evidence);
        }
        Ok(result)
    }

    fn parse_formula_primary(&mut self) -> Result<Formula, String> {
        match self.peek() {
            Some(Token::Number(text)) => {
                let b = match text.as_str() {
                    "1" => true,
                    "0" => false,
                    other => return Err(format!("expected `0` or `1`, found `{other}`")),
                };
                self.next();
                Ok(Formula::Const(b))
            }
            Some(Token::LParen) => {
                self.next();
                let inner = self.parse_formula_imp()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if name.eq_ignore_ascii_case("MRS") => {
                self.next();
                self.expect(&Token::LParen)?;
                let inner = self.parse_formula_imp()?;
                self.expect(&Token::RParen)?;
                Ok(Formula::Mrs(Box::new(inner)))
            }
            Some(Token::Ident(_)) => {
                let name = self.expect_ident()?;
                Ok(Formula::NodeAtom(name))
            }
            other => Err(format!("expected a formula, found `{other:?}`")),
        }
    }

    // --- Layer 2 probability-expression grammar ---

    fn parse_cmp_op(&mut self) -> Result<CmpOp, String> {
        match self.next() {
            Some(Token::Ge) => Ok(CmpOp::Ge),
            Some(Token::Gt) => Ok(CmpOp::Gt),
            Some(Token::Le) => Ok(CmpOp::Le),
            Some(Token::Lt) => Ok(CmpOp::Lt),
            Some(Token::EqEq) => Ok(CmpOp::Eq),
            Some(Token::NotEq) => Ok(CmpOp::Ne),
            other => Err(format!("expected a comparison operator, found `{other:?}`")),
        }
    }

    fn parse_layer2_imp(&mut self) -> Result<Layer2Expr, String> {
        let left = self.parse_layer2_eq()?;
        if self.peek_is(&Token::FatArrow) {
            self.next();
            let right = self.parse_layer2_imp()?;
            Ok(Layer2Expr::Imp(Box::new(left), Box::new(right)))
        } else {
            Ok(left)
        }
    }

    fn parse_layer2_eq(&mut self) -> Result<Layer2Expr, String> {
        let mut left = self.parse_layer2_or()?;
        loop {
            match self.peek() {
                Some(Token::EqEq) => {
                    self.next();
                    let right = self.parse_layer2_or()?;
                    left = Layer2Expr::Iff(Box::new(left), Box::new(right));
                }
                Some(Token::NotEq) => {
                    self.next();
                    let right = self.parse_layer2_or()?;
                    left = Layer2Expr::Xor(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_layer2_or(&mut self) -> Result<Layer2Expr, String> {
        let mut left = self.parse_layer2_and()?;
        while self.peek_is(&Token::OrOr) {
            self.next();
            let right = self.parse_layer2_and()?;
            left = Layer2Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_layer2_and(&mut self) -> Result<Layer2Expr, String> {
        let mut left = self.parse_layer2_not()?;
        while self.peek_is(&Token::AndAnd) {
            self.next();
            let right = self.parse_layer2_not()?;
            left = Layer2Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_layer2_not(&mut self) -> Result<Layer2Expr, String> {
        if self.peek_is(&Token::Bang) {
            self.next();
            let inner = self.parse_layer2_not()?;
            Ok(Layer2Expr::Not(Box::new(inner)))
        } else {
            self.parse_layer2_primary()
        }
    }

    fn parse_layer2_primary(&mut self) -> Result<Layer2Expr, String> {
        if self.at_ident_ci("P") {
            self.next();
            self.expect(&Token::LParen)?;
            let formula = self.parse_formula_imp()?;
            self.expect(&Token::RParen)?;
            let op = self.parse_cmp_op()?;
            let text = self.expect_number()?;
            let threshold = parse_rational(&text)?;
            let local_evidence = if self.peek_is(&Token::LBracket) {
                self.parse_bracketed_prob_evidence()?
            } else {
                ProbEvidence::new()
            };
            return Ok(Layer2Expr::Compare(ProbComparison { formula, op, threshold, local_evidence }));
        }
        if self.peek_is(&Token::LParen) {
            self.next();
            let inner = self.parse_layer2_imp()?;
            self.expect(&Token::RParen)?;
            let mut result = inner;
            while self.peek_is(&Token::LBracket) {
                let evidence = self.parse_bracketed_prob_evidence()?;
                result = Layer2Expr::WithProbabilityEvidence(Box::new(result), evidence);
            }
            return Ok(result);
        }
        Err(format!("expected `P(...)` or `(...)`, found `{:?}`", self.peek()))
    }

    // --- top-level query dispatch ---

    fn parse_query(&mut self) -> Result<Query, String> {
        if self.peek_is(&Token::LBrace) {
            let config = self.parse_braced_config()?;
            if self.at_ident_ci("P") {
                let expr = self.parse_layer2_imp()?;
                return Ok(Query::Probability { config, expr });
            }
            // `[[formula]]` (double brackets) selects Layer 1's "compute all" mode instead of a
            // single yes/no check (§1's "enumerate the minimal configurations"); the tokenizer has
            // no distinct double-bracket token, so this is just two adjacent `LBracket`s.
            if self.peek_is(&Token::LBracket) && self.tokens.get(self.pos + 1) == Some(&Token::LBracket) {
                self.next();
                self.next();
                let formula = self.parse_formula_imp()?;
                self.expect(&Token::RBracket)?;
                self.expect(&Token::RBracket)?;
                return Ok(Query::MinimalConfigs { config, formula });
            }
            let formula = self.parse_formula_imp()?;
            return Ok(Query::Boolean { config, formula });
        }

        if let Some(Token::Ident(name)) = self.peek() {
            let name = name.clone();
            let ctor: Option<fn(String, BoolEvidence) -> Query> = if name.eq_ignore_ascii_case("MostRiskyA") {
                Some(|object, evidence| Query::MostRiskyAttack { object, evidence })
            } else if name.eq_ignore_ascii_case("MostRiskyF") {
                Some(|object, evidence| Query::MostRiskyFault { object, evidence })
            } else if name.eq_ignore_ascii_case("OptimalConf") {
                Some(|object, evidence| Query::OptimalConf { object, evidence })
            } else if name.eq_ignore_ascii_case("MaxTotalRisk") {
                Some(|object, evidence| Query::MaxTotalRisk { object, evidence })
            } else if name.eq_ignore_ascii_case("MinTotalRisk") {
                Some(|object, evidence| Query::MinTotalRisk { object, evidence })
            } else {
                None
            };
            if let Some(ctor) = ctor {
                self.next();
                self.expect(&Token::LParen)?;
                let object = self.expect_ident()?;
                self.expect(&Token::RParen)?;
                let evidence = if self.peek_is(&Token::LBracket) {
                    self.parse_bracketed_bool_evidence()?
                } else {
                    BoolEvidence::new()
                };
                return Ok(ctor(object, evidence));
            }
        }

        Err(format!("expected a query, found `{:?}`", self.peek()))
    }
}

/// Parses one query clause (the text between a pair of top-level `;` separators, already
/// stripped by [`crate::io`]'s section splitter).
pub fn parse_query(text: &str) -> Result<Query, String> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.parse_query()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected trailing tokens after query: `{:?}`", &parser.tokens[parser.pos..]));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_layer1_query_with_config() {
        let q = parse_query("{a:1, b:0} a && !b").unwrap();
        match q {
            Query::Boolean { config, formula } => {
                assert_eq!(config.get("a"), Some(&true));
                assert_eq!(config.get("b"), Some(&false));
                assert_eq!(
                    formula,
                    Formula::mk_and(Formula::NodeAtom("a".into()), Formula::mk_not(Formula::NodeAtom("b".into())))
                );
            }
            other => panic!("expected a boolean query, got {other:?}"),
        }
    }

    #[test]
    fn parses_layer2_query_with_evidence() {
        let q = parse_query("{} P(x) >= 0.3 [x=0.8]").unwrap();
        match q {
            Query::Probability { expr: Layer2Expr::Compare(pc), .. } => {
                assert_eq!(pc.op, CmpOp::Ge);
                assert_eq!(pc.threshold, parse_rational("0.3").unwrap());
                assert_eq!(pc.local_evidence.get("x"), Some(&parse_rational("0.8").unwrap()));
            }
            other => panic!("expected a probability comparison, got {other:?}"),
        }
    }

    #[test]
    fn parses_compute_all_query() {
        let q = parse_query("{a:1} [[MRS(b) [x:1]]]").unwrap();
        match q {
            Query::MinimalConfigs { config, formula } => {
                assert_eq!(config.get("a"), Some(&true));
                assert!(matches!(formula, Formula::Mrs(_)));
            }
            other => panic!("expected a compute-all query, got {other:?}"),
        }
    }

    #[test]
    fn parses_layer3_most_risky() {
        let q = parse_query("MostRiskyA(System)").unwrap();
        assert!(matches!(q, Query::MostRiskyAttack { object, .. } if object == "System"));
    }

    #[test]
    fn imp_is_right_associative_and_loosest() {
        // a => b => c parses as a => (b => c), and && binds tighter than =>.
        let q = parse_query("{} a && b => c").unwrap();
        match q {
            Query::Boolean { formula, .. } => {
                let expected = Formula::mk_imp(
                    Formula::mk_and(Formula::NodeAtom("a".into()), Formula::NodeAtom("b".into())),
                    Formula::NodeAtom("c".into()),
                );
                assert_eq!(formula, expected);
            }
            other => panic!("expected a boolean query, got {other:?}"),
        }
    }
}
