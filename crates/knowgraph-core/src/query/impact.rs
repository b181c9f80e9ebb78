//! Reverse-dependency impact analysis.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::Serialize;

use crate::models::RelationshipKind;
use crate::query::guards::MAX_GRAPH_VISITED;
use crate::query::snapshot::GraphSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn from_total(total: usize) -> Self {
        if total >= 10 {
            RiskLevel::High
        } else if total >= 3 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImpactedNode {
    pub name: String,
    pub depth: usize,
    /// Kind of the edge through which this dependent was first reached.
    pub via: RelationshipKind,
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ImpactReport {
    pub target: String,
    pub target_file: Option<String>,
    pub dependents: Vec<ImpactedNode>,
    pub direct_count: usize,
    pub transitive_count: usize,
    pub affected_files: Vec<String>,
    pub risk_level: RiskLevel,
    /// Set when the visit guard stopped the walk early.
    pub truncated: bool,
}

impl ImpactReport {
    pub fn contains(&self, name: &str) -> bool {
        self.dependents.iter().any(|d| d.name == name)
    }
}

/// Every transitive dependent of `name`, breadth first. `None` when the
/// name is neither an element nor a relationship endpoint.
///
/// The walk visits at most [`MAX_GRAPH_VISITED`] nodes, target included.
/// Hitting that bound sets [`ImpactReport::truncated`] and keeps the
/// dependents found so far.
pub fn impact_analysis(snapshot: &GraphSnapshot, name: &str) -> Option<ImpactReport> {
    impact_within(snapshot, name, MAX_GRAPH_VISITED)
}

fn impact_within(
    snapshot: &GraphSnapshot,
    name: &str,
    visit_limit: usize,
) -> Option<ImpactReport> {
    let target = snapshot.resolve(name)?;

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(target.as_str());
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    queue.push_back((target.as_str(), 0));
    let mut dependents = Vec::new();
    let mut truncated = false;

    'walk: while let Some((current, depth)) = queue.pop_front() {
        let Some(callers) = snapshot.dependents_of(current) else {
            continue;
        };
        for (caller, kind) in callers {
            if visited.contains(caller.as_str()) {
                continue;
            }
            if visited.len() >= visit_limit {
                tracing::warn!(node = %target, visit_limit, "impact walk truncated");
                truncated = true;
                break 'walk;
            }
            visited.insert(caller.as_str());
            dependents.push(ImpactedNode {
                name: caller.clone(),
                depth: depth + 1,
                via: *kind,
                file_path: snapshot.file_of(caller).map(str::to_string),
            });
            queue.push_back((caller.as_str(), depth + 1));
        }
    }

    let target_file = snapshot.file_of(&target).map(str::to_string);
    let affected_files: BTreeSet<String> = target_file
        .iter()
        .cloned()
        .chain(dependents.iter().filter_map(|d| d.file_path.clone()))
        .collect();
    let direct_count = dependents.iter().filter(|d| d.depth == 1).count();
    let transitive_count = dependents.len() - direct_count;

    Some(ImpactReport {
        risk_level: RiskLevel::from_total(dependents.len()),
        target,
        target_file,
        dependents,
        direct_count,
        transitive_count,
        affected_files: affected_files.into_iter().collect(),
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::snapshot::tests::{edge, element, sample};
    use crate::store::traits::GraphData;

    #[test]
    fn unknown_name_is_not_found() {
        let snapshot = GraphSnapshot::from_data(&sample());
        assert!(impact_analysis(&snapshot, "Nope.Nothing").is_none());
    }

    #[test]
    fn isolated_element_has_empty_impact() {
        let mut data = sample();
        data.elements.push(element("App.Lonely", None, "L.cs"));
        let snapshot = GraphSnapshot::from_data(&data);
        let report = impact_analysis(&snapshot, "App.Lonely").unwrap();
        assert!(report.dependents.is_empty());
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.affected_files, vec!["L.cs"]);
    }

    #[test]
    fn dependents_are_transitive_and_lifted() {
        let snapshot = GraphSnapshot::from_data(&sample());
        let report = impact_analysis(&snapshot, "Save").unwrap();
        let names: Vec<&str> = report.dependents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names[..2], ["App.B.Go", "App.B"]);
        assert!(report.contains("App.A.Run"));
        assert!(report.contains("App.A"));
        assert!(!report.contains("Save"));
        assert_eq!(report.direct_count, 2);
        assert_eq!(report.affected_files, vec!["A.cs", "B.cs"]);
        assert_eq!(report.target_file, None);
        assert!(!report.truncated);
    }

    #[test]
    fn visit_limit_truncates_and_flags() {
        let mut data = GraphData::default();
        data.elements.push(element("Hub", None, "Hub.cs"));
        for i in 0..5 {
            let caller = format!("Caller{i}");
            data.elements.push(element(&caller, None, &format!("{caller}.cs")));
            data.edges.push(edge(&caller, "Hub", RelationshipKind::Calls));
        }
        let snapshot = GraphSnapshot::from_data(&data);

        let full = impact_analysis(&snapshot, "Hub").unwrap();
        assert_eq!(full.dependents.len(), 5);
        assert!(!full.truncated);

        let capped = impact_within(&snapshot, "Hub", 3).unwrap();
        assert!(capped.truncated);
        assert_eq!(capped.dependents.len(), 2);
    }

    #[test]
    fn cycles_terminate() {
        let data = GraphData {
            elements: vec![element("N.X", None, "X.cs"), element("N.Y", None, "Y.cs")],
            edges: vec![
                edge("N.X", "N.Y", RelationshipKind::Injects),
                edge("N.Y", "N.X", RelationshipKind::Injects),
            ],
        };
        let snapshot = GraphSnapshot::from_data(&data);
        let report = impact_analysis(&snapshot, "N.X").unwrap();
        assert_eq!(report.dependents.len(), 1);
        assert_eq!(report.dependents[0].via, RelationshipKind::Injects);
    }

    #[test]
    fn risk_thresholds() {
        assert_eq!(RiskLevel::from_total(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_total(3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_total(10), RiskLevel::High);
    }
}
