//! Circular dependency detection over the un-lifted graph.

use std::collections::{BTreeSet, HashMap};

use crate::query::snapshot::GraphSnapshot;

/// Rotate `cycle` so it starts at its lexicographically smallest node.
fn normalize(mut cycle: Vec<String>) -> Vec<String> {
    if let Some((start, _)) = cycle.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)) {
        cycle.rotate_left(start);
    }
    cycle
}

/// One cycle per DFS back-edge, normalised and deduplicated, sorted.
///
/// Every node is tried as a root so disconnected subgraphs are covered.
/// Self-loops never appear.
pub fn find_cycles(snapshot: &GraphSnapshot) -> Vec<Vec<String>> {
    let edges = snapshot.direct_edges();

    let mut names: BTreeSet<&str> = BTreeSet::new();
    for (from, targets) in edges {
        names.insert(from.as_str());
        names.extend(targets.iter().map(String::as_str));
    }
    let names: Vec<&str> = names.into_iter().collect();
    let ids: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let adjacency: Vec<Vec<usize>> = names
        .iter()
        .map(|name| {
            edges
                .get(*name)
                .map(|targets| {
                    targets
                        .iter()
                        .filter_map(|t| ids.get(t.as_str()).copied())
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let mut visited = vec![false; names.len()];
    // Position on the current DFS path, if on it.
    let mut on_path: Vec<Option<usize>> = vec![None; names.len()];
    let mut found: BTreeSet<Vec<String>> = BTreeSet::new();

    for root in 0..names.len() {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut path: Vec<usize> = vec![root];
        on_path[root] = Some(0);
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let Some(&next) = adjacency[node].get(cursor) else {
                stack.pop();
                path.pop();
                on_path[node] = None;
                continue;
            };
            frame.1 += 1;
            if next == node {
                continue;
            }
            if let Some(position) = on_path[next] {
                let cycle = path[position..]
                    .iter()
                    .map(|&i| names[i].to_string())
                    .collect();
                found.insert(normalize(cycle));
            } else if !visited[next] {
                visited[next] = true;
                on_path[next] = Some(path.len());
                path.push(next);
                stack.push((next, 0));
            }
        }
    }

    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RelationshipKind;
    use crate::query::snapshot::tests::{edge, element};
    use crate::store::traits::GraphData;

    fn snapshot(edges: &[(&str, &str)]) -> GraphSnapshot {
        GraphSnapshot::from_data(&GraphData {
            elements: vec![],
            edges: edges
                .iter()
                .map(|(a, b)| edge(a, b, RelationshipKind::Calls))
                .collect(),
        })
    }

    #[test]
    fn simple_cycle_is_rotated_to_smallest() {
        let cycles = find_cycles(&snapshot(&[("c", "a"), ("a", "b"), ("b", "c")]));
        assert_eq!(cycles, vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn self_loops_are_ignored() {
        assert!(find_cycles(&snapshot(&[("a", "a"), ("a", "b")])).is_empty());
    }

    #[test]
    fn disconnected_cycles_are_all_found() {
        let cycles = find_cycles(&snapshot(&[
            ("x", "y"),
            ("y", "x"),
            ("p", "q"),
            ("q", "r"),
            ("r", "p"),
            ("lone", "x"),
        ]));
        assert_eq!(cycles, vec![vec!["p", "q", "r"], vec!["x", "y"]]);
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        assert!(find_cycles(&snapshot(&[("a", "b"), ("b", "c"), ("a", "c")])).is_empty());
    }

    #[test]
    fn lifting_does_not_invent_cycles() {
        // A.Run -> B.Go and B.Go -> A.Other: types A and B are mutually
        // dependent only after lifting, which cycle detection does not use.
        let data = GraphData {
            elements: vec![
                element("N.A", None, "A.cs"),
                element("N.A.Run", Some("N.A"), "A.cs"),
                element("N.A.Other", Some("N.A"), "A.cs"),
                element("N.B", None, "B.cs"),
                element("N.B.Go", Some("N.B"), "B.cs"),
            ],
            edges: vec![
                edge("N.A.Run", "N.B.Go", RelationshipKind::Calls),
                edge("N.B.Go", "N.A.Other", RelationshipKind::Calls),
            ],
        };
        assert!(find_cycles(&GraphSnapshot::from_data(&data)).is_empty());
    }

    #[test]
    fn normalize_rotates() {
        let cycle = vec!["m".to_string(), "b".to_string(), "z".to_string()];
        assert_eq!(normalize(cycle), vec!["b", "z", "m"]);
    }
}
