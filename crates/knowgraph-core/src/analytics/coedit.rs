//! Co-edit strength and file clusters.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::errors::KnowgraphResult;
use crate::models::{CoEditEdge, CoEditedFile};
use crate::query::guards::{clamp_limit, MAX_RESULT_LIMIT};
use crate::store::{CoEditCounts, Database};

/// `count / max(edits_a, edits_b)`, clamped to [0, 1]. Symmetric in a and b.
pub fn co_edit_strength(co_edit_count: i64, edits_a: i64, edits_b: i64) -> f64 {
    let denominator = edits_a.max(edits_b);
    if denominator <= 0 || co_edit_count <= 0 {
        return 0.0;
    }
    (co_edit_count as f64 / denominator as f64).clamp(0.0, 1.0)
}

fn with_strength(counts: CoEditCounts) -> Vec<CoEditEdge> {
    let CoEditCounts { edges, edit_counts } = counts;
    let edits = |file: &str| edit_counts.get(file).copied().unwrap_or(0);
    edges
        .into_iter()
        .map(|mut edge| {
            edge.strength = co_edit_strength(edge.co_edit_count, edits(&edge.file_a), edits(&edge.file_b));
            edge
        })
        .collect()
}

pub fn co_edit_edges(db: &Database, context: &str) -> KnowgraphResult<Vec<CoEditEdge>> {
    Ok(with_strength(db.co_edit_counts(context)?))
}

/// Files edited together with `file_path`, strongest first.
pub fn co_edited_files(
    db: &Database,
    context: &str,
    file_path: &str,
    limit: i64,
) -> KnowgraphResult<Vec<CoEditedFile>> {
    let mut partners: Vec<CoEditedFile> = co_edit_edges(db, context)?
        .into_iter()
        .filter_map(|edge| {
            let partner = if edge.file_a == file_path {
                edge.file_b
            } else if edge.file_b == file_path {
                edge.file_a
            } else {
                return None;
            };
            Some(CoEditedFile {
                file_path: partner,
                co_edit_count: edge.co_edit_count,
                strength: edge.strength,
            })
        })
        .collect();
    partners.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.co_edit_count.cmp(&a.co_edit_count))
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    partners.truncate(clamp_limit(limit, MAX_RESULT_LIMIT) as usize);
    Ok(partners)
}

/// Disjoint sets over dense indices, with path halving.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller index wins so roots are stable.
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

/// Connected components over edges with `co_edit_count >= threshold`,
/// keeping components of two or more files. Files inside a cluster and the
/// clusters themselves are sorted.
pub fn clusters_from_edges(edges: &[CoEditEdge], threshold: i64) -> Vec<Vec<String>> {
    let strong: Vec<&CoEditEdge> = edges
        .iter()
        .filter(|edge| edge.co_edit_count >= threshold)
        .collect();
    let files: BTreeSet<&str> = strong
        .iter()
        .flat_map(|edge| [edge.file_a.as_str(), edge.file_b.as_str()])
        .collect();
    let files: Vec<&str> = files.into_iter().collect();
    let index: HashMap<&str, usize> = files.iter().enumerate().map(|(i, f)| (*f, i)).collect();

    let mut sets = DisjointSet::new(files.len());
    for edge in &strong {
        if let (Some(&a), Some(&b)) = (index.get(edge.file_a.as_str()), index.get(edge.file_b.as_str())) {
            sets.union(a, b);
        }
    }

    let mut components: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (i, file) in files.iter().enumerate() {
        components.entry(sets.find(i)).or_default().push(file.to_string());
    }
    let mut clusters: Vec<Vec<String>> = components
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect();
    clusters.sort();
    clusters
}

pub fn file_clusters(db: &Database, context: &str, threshold: i64) -> KnowgraphResult<Vec<Vec<String>>> {
    let edges = co_edit_edges(db, context)?;
    Ok(clusters_from_edges(&edges, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CO_EDIT_CLUSTER_THRESHOLD;

    fn edge(a: &str, b: &str, count: i64) -> CoEditEdge {
        CoEditEdge {
            file_a: a.to_string(),
            file_b: b.to_string(),
            context: "ctx".to_string(),
            co_edit_count: count,
            strength: 0.0,
            last_co_edited_at: None,
        }
    }

    #[test]
    fn strength_is_symmetric_and_bounded() {
        assert_eq!(co_edit_strength(3, 4, 6), co_edit_strength(3, 6, 4));
        assert!((co_edit_strength(3, 4, 6) - 0.5).abs() < 1e-12);
        assert_eq!(co_edit_strength(9, 2, 3), 1.0);
        assert_eq!(co_edit_strength(2, 0, 0), 0.0);
    }

    #[test]
    fn weak_edges_do_not_cluster() {
        let edges = vec![edge("a", "b", 3), edge("b", "c", 2), edge("x", "y", 5), edge("y", "z", 3)];
        let clusters = clusters_from_edges(&edges, CO_EDIT_CLUSTER_THRESHOLD);
        assert_eq!(clusters, vec![vec!["a", "b"], vec!["x", "y", "z"]]);
    }

    #[test]
    fn no_strong_edges_means_no_clusters() {
        assert!(clusters_from_edges(&[edge("a", "b", 1)], CO_EDIT_CLUSTER_THRESHOLD).is_empty());
    }

    #[test]
    fn strength_uses_edit_counts() {
        let counts = CoEditCounts {
            edges: vec![edge("a", "b", 2)],
            edit_counts: [("a".to_string(), 2), ("b".to_string(), 4)].into_iter().collect(),
        };
        let edges = with_strength(counts);
        assert!((edges[0].strength - 0.5).abs() < 1e-12);
    }
}
