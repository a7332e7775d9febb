//! Parses the attack-tree, fault-tree, and object-graph sections (§6) into the raw structures
//! [`crate::model::store::ModelStore::build`] validates. Uses the same hand-written tokenizer as
//! [`super::formula_parser`], but its own small statement grammar: `toplevel X;`, `N and/or ...;`,
//! `N prob=.. impact=.. objects=[..] cond=(..);`, `O has ...;`, `O properties=[..];`.
use super::tokenizer::{tokenize, Token};
use crate::ast::CondExpr;
use crate::model::object_graph::ObjectDef;
use crate::model::tree::{DisruptionTree, Gate, GateKind, TreeKind, TreeNode};
use crate::model::ObjectGraph;
use crate::rational::parse_rational;
use indexmap::{IndexMap, IndexSet};

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

    fn at_ident_ci(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name.eq_ignore_ascii_case(word))
    }

    fn peek_is(&self, tok: &Token) -> bool {
        self.peek() == Some(tok)
    }

    fn parse_ident_list(&mut self) -> Result<Vec<String>, String> {
        let mut out = vec![self.expect_ident()?];
        while let Some(Token::Ident(_)) = self.peek() {
            out.push(self.expect_ident()?);
        }
        Ok(out)
    }

    fn parse_bracketed_ident_list(&mut self) -> Result<IndexSet<String>, String> {
        self.expect(&Token::LBracket)?;
        let mut set = IndexSet::new();
        if self.peek_is(&Token::RBracket) {
            self.next();
            return Ok(set);
        }
        loop {
            set.insert(self.expect_ident()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                other => return Err(format!("expected `,` or `]`, found `{other:?}`")),
            }
        }
        Ok(set)
    }

    // --- condition expressions: same precedence ladder as the formula grammar, over CondExpr ---

    fn parse_cond_imp(&mut self) -> Result<CondExpr, String> {
        let left = self.parse_cond_eq()?;
        if self.peek_is(&Token::FatArrow) {
            self.next();
            let right = self.parse_cond_imp()?;
            return Ok(CondExpr::Imp(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_cond_eq(&mut self) -> Result<CondExpr, String> {
        let mut left = self.parse_cond_or()?;
        loop {
            match self.peek() {
                Some(Token::EqEq) => {
                    self.next();
                    let right = self.parse_cond_or()?;
                    left = CondExpr::Iff(Box::new(left), Box::new(right));
                }
                Some(Token::NotEq) => {
                    self.next();
                    let right = self.parse_cond_or()?;
                    left = CondExpr::Xor(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_cond_or(&mut self) -> Result<CondExpr, String> {
        let mut left = self.parse_cond_and()?;
        while self.peek_is(&Token::OrOr) {
            self.next();
            let right = self.parse_cond_and()?;
            left = CondExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cond_and(&mut self) -> Result<CondExpr, String> {
        let mut left = self.parse_cond_not()?;
        while self.peek_is(&Token::AndAnd) {
            self.next();
            let right = self.parse_cond_not()?;
            left = CondExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cond_not(&mut self) -> Result<CondExpr, String> {
        if self.peek_is(&Token::Bang) {
            self.next();
            let inner = self.parse_cond_not()?;
            return Ok(CondExpr::Not(Box::new(inner)));
        }
        self.parse_cond_primary()
    }

    fn parse_cond_primary(&mut self) -> Result<CondExpr, String> {
        match self.peek() {
            Some(Token::Number(text)) => {
                let b = match text.as_str() {
                    "1" => true,
                    "0" => false,
                    other => return Err(format!("expected `0` or `1`, found `{other}`")),
                };
                self.next();
                Ok(CondExpr::Const(b))
            }
            Some(Token::LParen) => {
                self.next();
                let inner = self.parse_cond_imp()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(_)) => Ok(CondExpr::Prop(self.expect_ident()?)),
            other => Err(format!("expected a condition, found `{other:?}`")),
        }
    }
}

fn node_entry<'a>(nodes: &'a mut IndexMap<String, TreeNode>, name: &str) -> &'a mut TreeNode {
    nodes.entry(name.to_string()).or_insert_with(|| TreeNode {
        name: name.to_string(),
        gate: None,
        prob: None,
        impact: None,
        declared_objects: IndexSet::new(),
        cond: None,
    })
}

/// Parses one disruption-tree section's statements into a [`DisruptionTree`].
pub fn parse_tree(kind: TreeKind, statements: &[String]) -> Result<DisruptionTree, String> {
    let mut nodes: IndexMap<String, TreeNode> = IndexMap::new();
    let mut root: Option<String> = None;

    for stmt in statements {
        let tokens = tokenize(stmt)?;
        if tokens.is_empty() {
            continue;
        }
        let mut p = Parser { tokens, pos: 0 };

        if p.at_ident_ci("toplevel") {
            p.next();
            root = Some(p.expect_ident()?);
            continue;
        }

        let name = p.expect_ident()?;
        if p.at_ident_ci("and") || p.at_ident_ci("or") {
            let kind_word = p.expect_ident()?;
            let gate_kind = if kind_word.eq_ignore_ascii_case("and") { GateKind::And } else { GateKind::Or };
            let children = p.parse_ident_list()?;
            node_entry(&mut nodes, &name).gate = Some(Gate { kind: gate_kind, children });
            continue;
        }

        let entry = node_entry(&mut nodes, &name);
        while let Some(Token::Ident(keyword)) = p.peek().cloned() {
            p.next();
            p.expect(&Token::Equals)?;
            match keyword.to_ascii_lowercase().as_str() {
                "prob" => {
                    let tokens_text = match p.next() {
                        Some(Token::Number(t)) => t,
                        other => return Err(format!("expected a rational after `prob=`, found `{other:?}`")),
                    };
                    entry.prob = Some(parse_rational(&tokens_text)?);
                }
                "impact" => {
                    let tokens_text = match p.next() {
                        Some(Token::Number(t)) => t,
                        other => return Err(format!("expected a rational after `impact=`, found `{other:?}`")),
                    };
                    entry.impact = Some(parse_rational(&tokens_text)?);
                }
                "objects" => {
                    entry.declared_objects = p.parse_bracketed_ident_list()?;
                }
                "cond" => {
                    p.expect(&Token::LParen)?;
                    entry.cond = Some(p.parse_cond_imp()?);
                    p.expect(&Token::RParen)?;
                }
                other => return Err(format!("unknown node attribute `{other}`")),
            }
        }
    }

    let root = root.ok_or_else(|| format!("{kind} tree has no `toplevel` declaration"))?;
    Ok(DisruptionTree { kind, root, nodes })
}

/// Parses the object-graph section's statements into an [`ObjectGraph`].
pub fn parse_object_graph(statements: &[String]) -> Result<ObjectGraph, String> {
    let mut objects: IndexMap<String, ObjectDef> = IndexMap::new();

    for stmt in statements {
        let tokens = tokenize(stmt)?;
        if tokens.is_empty() {
            continue;
        }
        let mut p = Parser { tokens, pos: 0 };
        let name = p.expect_ident()?;
        let entry = objects
            .entry(name.clone())
            .or_insert_with(|| ObjectDef { name: name.clone(), has: IndexSet::new(), properties: IndexSet::new() });

        if p.at_ident_ci("has") {
            p.next();
            let targets = p.parse_ident_list()?;
            entry.has.extend(targets);
            continue;
        }

        if p.at_ident_ci("properties") {
            p.next();
            p.expect(&Token::Equals)?;
            let props = p.parse_bracketed_ident_list()?;
            entry.properties.extend(props);
            continue;
        }

        return Err(format!("expected `has` or `properties=` after object name `{name}`"));
    }

    Ok(ObjectGraph { objects })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_small_or_tree_with_conditions() {
        let stmts = vec![
            "toplevel R".to_string(),
            "R or PL DD".to_string(),
            "PL prob=0.10 impact=1 objects=[Sys] cond=(locked)".to_string(),
            "DD prob=0.13 impact=2".to_string(),
        ];
        let tree = parse_tree(TreeKind::Attack, &stmts).unwrap();
        assert_eq!(tree.root, "R");
        assert_eq!(tree.nodes["PL"].prob, Some(parse_rational("0.10").unwrap()));
        assert!(tree.nodes["PL"].cond.is_some());
        assert!(tree.nodes["R"].gate.is_some());
    }

    #[test]
    fn parses_object_graph_has_and_properties() {
        let stmts = vec!["A has B C".to_string(), "B properties=[locked, patched]".to_string()];
        let graph = parse_object_graph(&stmts).unwrap();
        assert!(graph.objects["A"].has.contains("B"));
        assert!(graph.objects["B"].properties.contains("locked"));
    }
}
