//! C1: the immutable, validated model — attack tree, fault tree, and object graph — plus the
//! structural queries §4.1 exposes to descent (C2), the compiler (C3), and the risk engine (C6).
use crate::error::{DflError, DflResult};
use crate::model::object_graph::ObjectGraph;
use crate::model::tree::{DisruptionTree, TreeKind};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

/// What a bare name resolves to when it appears as a formula atom (§4.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameKind {
    AttackNode,
    FaultNode,
    ObjectProperty,
}

pub struct ModelStore {
    pub attack: DisruptionTree,
    pub fault: DisruptionTree,
    pub objects: ObjectGraph,
    /// Node name -> fully `has`-expanded object set, precomputed at load time so §4.1's
    /// `participants` query never re-walks the object graph.
    expanded_objects: HashMap<String, IndexSet<String>>,
}

impl ModelStore {
    /// Validates and freezes the three structures (§4.1 "Validation is performed once at load").
    pub fn build(attack: DisruptionTree, fault: DisruptionTree, objects: ObjectGraph) -> DflResult<ModelStore> {
        validate_tree(&attack)?;
        validate_tree(&fault)?;
        validate_names(&attack, &fault, &objects)?;
        validate_references(&attack, &objects)?;
        validate_references(&fault, &objects)?;
        validate_has_targets(&objects)?;

        let mut expanded_objects = HashMap::new();
        for tree in [&attack, &fault] {
            for node in tree.nodes.values() {
                let mut expanded = IndexSet::new();
                for obj in &node.declared_objects {
                    expanded.extend(objects.transitive_closure(obj));
                }
                expanded_objects.insert(node.name.clone(), expanded);
            }
        }

        Ok(ModelStore { attack, fault, objects, expanded_objects })
    }

    pub fn tree(&self, kind: TreeKind) -> &DisruptionTree {
        match kind {
            TreeKind::Attack => &self.attack,
            TreeKind::Fault => &self.fault,
        }
    }

    /// Resolves a bare name to the tree/property namespace it lives in. Global name uniqueness
    /// (enforced at [`ModelStore::build`] time) guarantees at most one of these matches.
    pub fn resolve_name(&self, name: &str) -> Option<NameKind> {
        if self.attack.contains(name) {
            Some(NameKind::AttackNode)
        } else if self.fault.contains(name) {
            Some(NameKind::FaultNode)
        } else if self.objects.has_property(name) {
            Some(NameKind::ObjectProperty)
        } else {
            None
        }
    }

    pub fn has_object_property(&self, name: &str) -> bool {
        self.objects.has_property(name)
    }

    pub fn all_properties(&self) -> IndexSet<String> {
        self.objects.all_properties()
    }

    /// Every node reachable from `n` in `tree`, including `n` itself.
    pub fn descendants(&self, tree: &DisruptionTree, n: &str) -> IndexSet<String> {
        let mut seen = IndexSet::new();
        let mut stack = vec![n.to_string()];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur.clone()) {
                continue;
            }
            for child in tree.children_of(&cur) {
                if !seen.contains(child) {
                    stack.push(child.clone());
                }
            }
        }
        seen
    }

    pub fn strict_descendants(&self, tree: &DisruptionTree, n: &str) -> IndexSet<String> {
        let mut d = self.descendants(tree, n);
        d.shift_remove(n);
        d
    }

    /// Leaf (basic) nodes within `descendants(n)`, inclusive of `n` itself if `n` is basic.
    pub fn basic_descendants(&self, tree: &DisruptionTree, n: &str) -> IndexSet<String> {
        self.descendants(tree, n)
            .into_iter()
            .filter(|name| tree.get(name).is_some_and(|node| node.is_basic()))
            .collect()
    }

    /// `n` is a module iff every predecessor of every strict descendant of `n` is itself a
    /// strict descendant of `n` (or `n`) — §4.1.
    pub fn is_module(&self, tree: &DisruptionTree, n: &str) -> bool {
        let strict = self.strict_descendants(tree, n);
        strict.iter().all(|d| {
            tree.parents_of(d).into_iter().all(|p| p == n || strict.contains(p))
        })
    }

    /// Every tree node (either tree) whose `has`-expanded object set contains `object_name`.
    pub fn participants(&self, object_name: &str) -> Vec<(TreeKind, String)> {
        let mut out = Vec::new();
        for (kind, tree) in [(TreeKind::Attack, &self.attack), (TreeKind::Fault, &self.fault)] {
            for node in tree.nodes.values() {
                if self
                    .expanded_objects
                    .get(&node.name)
                    .is_some_and(|objs| objs.contains(object_name))
                {
                    out.push((kind, node.name.clone()));
                }
            }
        }
        out
    }
}

fn validate_tree(tree: &DisruptionTree) -> DflResult<()> {
    if !tree.nodes.contains_key(&tree.root) {
        return Err(DflError::MissingRoot { tree: tree.kind.to_string() });
    }

    let roots: Vec<String> = tree
        .nodes
        .keys()
        .filter(|name| tree.parents_of(name).is_empty())
        .cloned()
        .collect();
    if roots.len() > 1 {
        return Err(DflError::MultipleRoots { tree: tree.kind.to_string(), candidates: roots });
    }

    detect_cycle(tree)?;
    detect_disconnected(tree)?;
    Ok(())
}

fn detect_cycle(tree: &DisruptionTree) -> DflResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    fn visit<'a>(
        tree: &'a DisruptionTree,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> DflResult<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                return Err(DflError::CyclicTree { tree: tree.kind.to_string(), node: name.to_string() })
            }
            None => {}
        }
        marks.insert(name, Mark::InProgress);
        for child in tree.children_of(name) {
            visit(tree, child, marks)?;
        }
        marks.insert(name, Mark::Done);
        Ok(())
    }

    visit(tree, &tree.root, &mut marks)
}

fn detect_disconnected(tree: &DisruptionTree) -> DflResult<()> {
    let mut reached: HashSet<&str> = HashSet::new();
    let mut stack = vec![tree.root.as_str()];
    while let Some(cur) = stack.pop() {
        if !reached.insert(cur) {
            continue;
        }
        for child in tree.children_of(cur) {
            stack.push(child);
        }
        for parent in tree.parents_of(cur) {
            stack.push(parent);
        }
    }
    for name in tree.nodes.keys() {
        if !reached.contains(name.as_str()) {
            return Err(DflError::Disconnected { tree: tree.kind.to_string(), node: name.clone() });
        }
    }
    Ok(())
}

fn validate_names(attack: &DisruptionTree, fault: &DisruptionTree, objects: &ObjectGraph) -> DflResult<()> {
    let mut seen = HashSet::new();
    for name in attack
        .nodes
        .keys()
        .chain(fault.nodes.keys())
        .chain(objects.objects.keys())
        .chain(objects.all_properties().iter())
    {
        if !seen.insert(name.clone()) {
            return Err(DflError::DuplicateName(name.clone()));
        }
    }
    Ok(())
}

fn validate_references(tree: &DisruptionTree, objects: &ObjectGraph) -> DflResult<()> {
    for node in tree.nodes.values() {
        for obj in &node.declared_objects {
            if !objects.contains(obj) {
                return Err(DflError::UnknownObject { node: node.name.clone(), object: obj.clone() });
            }
        }
        if let Some(cond) = &node.cond {
            for prop in cond.properties() {
                if !objects.has_property(&prop) {
                    return Err(DflError::UnknownPropertyInCondition {
                        node: node.name.clone(),
                        property: prop,
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_has_targets(objects: &ObjectGraph) -> DflResult<()> {
    for def in objects.objects.values() {
        for target in &def.has {
            if !objects.contains(target) {
                return Err(DflError::UnknownHasTarget(target.clone()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::{Gate, GateKind, TreeNode};
    use indexmap::IndexMap;

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

    fn and_gate(name: &str, children: &[&str]) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            gate: Some(Gate { kind: GateKind::And, children: children.iter().map(|s| s.to_string()).collect() }),
            prob: None,
            impact: None,
            declared_objects: IndexSet::new(),
            cond: None,
        }
    }

    fn small_tree() -> DisruptionTree {
        let mut nodes = IndexMap::new();
        nodes.insert("R".to_string(), and_gate("R", &["A", "B"]));
        nodes.insert("A".to_string(), basic("A"));
        nodes.insert("B".to_string(), basic("B"));
        DisruptionTree { kind: TreeKind::Attack, root: "R".to_string(), nodes }
    }

    #[test]
    fn module_predicate_holds_for_whole_tree_root() {
        let tree = small_tree();
        let store = ModelStore::build(tree, empty_fault(), ObjectGraph::default()).unwrap();
        assert!(store.is_module(&store.attack, "R"));
        assert!(store.is_module(&store.attack, "A"));
    }

    fn empty_fault() -> DisruptionTree {
        let mut nodes = IndexMap::new();
        nodes.insert("FR".to_string(), basic("FR"));
        DisruptionTree { kind: TreeKind::Fault, root: "FR".to_string(), nodes }
    }

    #[test]
    fn detects_missing_root() {
        let mut tree = small_tree();
        tree.root = "NOPE".to_string();
        let err = validate_tree(&tree).unwrap_err();
        assert!(matches!(err, DflError::MissingRoot { .. }));
    }

    #[test]
    fn descendants_include_self() {
        let tree = small_tree();
        let store = ModelStore::build(tree, empty_fault(), ObjectGraph::default()).unwrap();
        let d = store.descendants(&store.attack, "R");
        assert!(d.contains("R") && d.contains("A") && d.contains("B"));
        let strict = store.strict_descendants(&store.attack, "R");
        assert!(!strict.contains("R"));
    }
}
