//! In-memory view of one context's graph for traversal algorithms.
//!
//! Relationship endpoints are canonicalised against the element table, and
//! member-level edges are additionally lifted to their declaring types so a
//! call into `B.Go` also counts as a dependency on `B`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;

use crate::errors::KnowgraphResult;
use crate::models::RelationshipKind;
use crate::store::traits::{GraphData, GraphStore};

#[derive(Clone, Debug)]
struct ElementInfo {
    file_path: String,
    parent: Option<String>,
}

/// Adjacency keyed by node, then by neighbour, remembering the kind of the
/// first edge that connected them. Insertion order is edge order.
pub(crate) type Adjacency = HashMap<String, IndexMap<String, RelationshipKind>>;

#[derive(Clone, Debug, Default)]
pub struct GraphSnapshot {
    elements: HashMap<String, ElementInfo>,
    known: HashSet<String>,
    forward: Adjacency,
    reverse: Adjacency,
    direct: BTreeMap<String, BTreeSet<String>>,
}

fn link(adjacency: &mut Adjacency, from: &str, to: &str, kind: RelationshipKind) {
    adjacency
        .entry(from.to_string())
        .or_default()
        .entry(to.to_string())
        .or_insert(kind);
}

impl GraphSnapshot {
    pub fn load(store: &dyn GraphStore, context: Option<&str>) -> KnowgraphResult<Self> {
        Ok(Self::from_data(&store.load_graph(context)?))
    }

    pub fn from_data(data: &GraphData) -> Self {
        let mut elements: HashMap<String, ElementInfo> = HashMap::new();
        let mut by_short: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for element in &data.elements {
            elements
                .entry(element.qualified_name.clone())
                .or_insert_with(|| ElementInfo {
                    file_path: element.file_path.clone(),
                    parent: element.parent.clone(),
                });
            by_short
                .entry(element.short_name.as_str())
                .or_default()
                .insert(element.qualified_name.as_str());
        }

        let canonical = |name: &str| -> String {
            if elements.contains_key(name) {
                return name.to_string();
            }
            match by_short.get(name) {
                Some(candidates) if candidates.len() == 1 => candidates
                    .iter()
                    .next()
                    .map(|qn| qn.to_string())
                    .unwrap_or_else(|| name.to_string()),
                _ => name.to_string(),
            }
        };

        let mut snapshot = GraphSnapshot {
            known: elements.keys().cloned().collect(),
            ..GraphSnapshot::default()
        };

        for edge in &data.edges {
            let rel = &edge.relationship;
            let from = canonical(&rel.from);
            let to = canonical(&rel.to);
            snapshot.known.insert(from.clone());
            snapshot.known.insert(to.clone());
            if from == to {
                continue;
            }
            snapshot
                .direct
                .entry(from.clone())
                .or_default()
                .insert(to.clone());

            let from_owner = elements.get(&from).and_then(|e| e.parent.clone());
            let to_owner = elements.get(&to).and_then(|e| e.parent.clone());
            let mut pairs: Vec<(&str, &str)> = vec![(from.as_str(), to.as_str())];
            if let Some(owner) = from_owner.as_deref() {
                pairs.push((owner, to.as_str()));
            }
            if let Some(owner) = to_owner.as_deref() {
                pairs.push((from.as_str(), owner));
            }
            if let (Some(a), Some(b)) = (from_owner.as_deref(), to_owner.as_deref()) {
                pairs.push((a, b));
            }
            for (a, b) in pairs {
                if a == b {
                    continue;
                }
                link(&mut snapshot.forward, a, b, rel.kind);
                link(&mut snapshot.reverse, b, a, rel.kind);
            }
        }

        snapshot.elements = elements;
        snapshot
    }

    /// True for element names and relationship endpoints.
    pub fn contains(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Map a caller-supplied name onto a node: exact first, then the single
    /// element whose qualified name ends with `.name`.
    pub fn resolve(&self, name: &str) -> Option<String> {
        if self.known.contains(name) {
            return Some(name.to_string());
        }
        let suffix = format!(".{name}");
        let mut matches = self
            .elements
            .keys()
            .filter(|qn| qn.ends_with(&suffix));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }

    pub fn file_of(&self, name: &str) -> Option<&str> {
        self.elements.get(name).map(|e| e.file_path.as_str())
    }

    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.elements.get(name).and_then(|e| e.parent.as_deref())
    }

    /// Lifted outgoing neighbours.
    pub(crate) fn dependencies_of(&self, name: &str) -> Option<&IndexMap<String, RelationshipKind>> {
        self.forward.get(name)
    }

    /// Lifted incoming neighbours.
    pub(crate) fn dependents_of(&self, name: &str) -> Option<&IndexMap<String, RelationshipKind>> {
        self.reverse.get(name)
    }

    /// Canonical, un-lifted edges without self-loops.
    pub(crate) fn direct_edges(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.direct
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{
        CodeElement, EdgeRecord, ElementKind, ElementMetadata, MethodMetrics, Relationship,
    };

    pub(crate) fn element(qualified: &str, parent: Option<&str>, file: &str) -> CodeElement {
        let short = qualified
            .split_once('.')
            .map(|(_, rest)| rest)
            .unwrap_or(qualified);
        CodeElement {
            qualified_name: qualified.to_string(),
            short_name: short.to_string(),
            name: qualified.rsplit('.').next().unwrap_or(qualified).to_string(),
            kind: if parent.is_some() {
                ElementKind::Method
            } else {
                ElementKind::Type
            },
            file_path: file.to_string(),
            context: "ctx".to_string(),
            start_line: 1,
            end_line: 10,
            parent: parent.map(str::to_string),
            metadata: ElementMetadata::Method(MethodMetrics::default()),
        }
    }

    pub(crate) fn edge(from: &str, to: &str, kind: RelationshipKind) -> EdgeRecord {
        EdgeRecord {
            relationship: Relationship {
                from: from.to_string(),
                to: to.to_string(),
                kind,
                line_number: 1,
                caller_object: None,
                inferred_type: None,
                expression: None,
                parameter_name: None,
            },
            file_path: "X.cs".to_string(),
            context: "ctx".to_string(),
        }
    }

    /// `App.A.Run` calls `App.B.Go` (by short name) and `App.B.Go` calls an
    /// unresolved `Save`.
    pub(crate) fn sample() -> GraphData {
        GraphData {
            elements: vec![
                element("App.A", None, "A.cs"),
                element("App.A.Run", Some("App.A"), "A.cs"),
                element("App.B", None, "B.cs"),
                element("App.B.Go", Some("App.B"), "B.cs"),
            ],
            edges: vec![
                edge("App.A.Run", "B.Go", RelationshipKind::Calls),
                edge("App.B.Go", "Save", RelationshipKind::Calls),
            ],
        }
    }

    #[test]
    fn endpoints_are_canonicalised_by_unique_short_name() {
        let snapshot = GraphSnapshot::from_data(&sample());
        let deps = snapshot.dependencies_of("App.A.Run").unwrap();
        assert!(deps.contains_key("App.B.Go"));
        assert!(snapshot.contains("Save"));
        assert!(!snapshot.contains("B.Go"));
    }

    #[test]
    fn member_edges_lift_to_owners() {
        let snapshot = GraphSnapshot::from_data(&sample());
        let from_type = snapshot.dependencies_of("App.A").unwrap();
        assert!(from_type.contains_key("App.B.Go"));
        assert!(from_type.contains_key("App.B"));
        let into_type = snapshot.dependents_of("App.B").unwrap();
        assert!(into_type.contains_key("App.A.Run"));
        assert!(into_type.contains_key("App.A"));
        // Lifting never adds edges to the un-lifted view.
        assert!(!snapshot.direct_edges().contains_key("App.A"));
    }

    #[test]
    fn ambiguous_short_names_stay_raw() {
        let mut data = sample();
        data.elements.push(element("Other.B", None, "C.cs"));
        data.elements.push(element("Other.B.Go", Some("Other.B"), "C.cs"));
        let snapshot = GraphSnapshot::from_data(&data);
        let deps = snapshot.dependencies_of("App.A.Run").unwrap();
        assert!(deps.contains_key("B.Go"));
    }

    #[test]
    fn resolve_accepts_unique_suffix() {
        let snapshot = GraphSnapshot::from_data(&sample());
        assert_eq!(snapshot.resolve("B.Go").as_deref(), Some("App.B.Go"));
        assert_eq!(snapshot.resolve("App.A").as_deref(), Some("App.A"));
        assert_eq!(snapshot.resolve("Missing"), None);
        assert_eq!(snapshot.file_of("App.A.Run"), Some("A.cs"));
        assert_eq!(snapshot.owner_of("App.A.Run"), Some("App.A"));
    }
}
