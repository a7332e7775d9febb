//! The object graph (§3 "Object graph"): a DAG of objects linked by `has`, each carrying a set
//! of leaf property names.
use indexmap::{IndexMap, IndexSet};

#[derive(Clone, Debug, Default)]
pub struct ObjectDef {
    pub name: String,
    pub has: IndexSet<String>,
    pub properties: IndexSet<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ObjectGraph {
    pub objects: IndexMap<String, ObjectDef>,
}

impl ObjectGraph {
    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.get(name)
    }

    /// All objects reachable from `name` through `has`, including `name` itself (used to expand
    /// a node's declared `objects=[...]` transitively, §3 "Transitive closure through `has`").
    pub fn transitive_closure(&self, name: &str) -> IndexSet<String> {
        let mut seen = IndexSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur.clone()) {
                continue;
            }
            if let Some(def) = self.objects.get(&cur) {
                for next in &def.has {
                    if !seen.contains(next) {
                        stack.push(next.clone());
                    }
                }
            }
        }
        seen
    }

    /// Every property name declared anywhere in the graph.
    pub fn all_properties(&self) -> IndexSet<String> {
        let mut acc = IndexSet::new();
        for def in self.objects.values() {
            acc.extend(def.properties.iter().cloned());
        }
        acc
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.objects.values().any(|def| def.properties.contains(name))
    }
}
