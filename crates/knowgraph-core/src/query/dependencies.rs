//! Forward dependency chains.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::models::RelationshipKind;
use crate::query::guards::{clamp_depth, MAX_DEPENDENCY_DEPTH, MAX_GRAPH_VISITED};
use crate::query::snapshot::GraphSnapshot;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DependencyLink {
    pub name: String,
    /// Node whose edge discovered `name`.
    pub from: String,
    pub depth: i64,
    pub via: RelationshipKind,
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DependencyChain {
    pub root: String,
    pub max_depth: i64,
    pub dependencies: Vec<DependencyLink>,
    pub truncated: bool,
}

impl DependencyChain {
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d.name == name)
    }
}

/// Breadth-first walk of outgoing edges from `name`, in discovery order.
/// `None` when the name is unknown.
///
/// `max_depth` is clamped to `1..=`[`MAX_DEPENDENCY_DEPTH`] (16); the
/// clamped value is reported in [`DependencyChain::max_depth`]. The walk
/// visits at most [`MAX_GRAPH_VISITED`] nodes; hitting that bound sets
/// [`DependencyChain::truncated`].
pub fn dependency_chain(
    snapshot: &GraphSnapshot,
    name: &str,
    max_depth: i64,
) -> Option<DependencyChain> {
    chain_within(snapshot, name, max_depth, MAX_GRAPH_VISITED)
}

fn chain_within(
    snapshot: &GraphSnapshot,
    name: &str,
    max_depth: i64,
    visit_limit: usize,
) -> Option<DependencyChain> {
    let root = snapshot.resolve(name)?;
    let max_depth = clamp_depth(max_depth, MAX_DEPENDENCY_DEPTH);

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(root.as_str());
    let mut queue: VecDeque<(&str, i64)> = VecDeque::new();
    queue.push_back((root.as_str(), 0));
    let mut dependencies = Vec::new();
    let mut truncated = false;

    'walk: while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(targets) = snapshot.dependencies_of(current) else {
            continue;
        };
        for (target, kind) in targets {
            if visited.contains(target.as_str()) {
                continue;
            }
            if visited.len() >= visit_limit {
                tracing::warn!(root = %root, visit_limit, "dependency walk truncated");
                truncated = true;
                break 'walk;
            }
            visited.insert(target.as_str());
            dependencies.push(DependencyLink {
                name: target.clone(),
                from: current.to_string(),
                depth: depth + 1,
                via: *kind,
                file_path: snapshot.file_of(target).map(str::to_string),
            });
            queue.push_back((target.as_str(), depth + 1));
        }
    }

    Some(DependencyChain {
        root,
        max_depth,
        dependencies,
        truncated,
    })
}
