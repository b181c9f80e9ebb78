//! Engine configuration: weights, thresholds, and the related-language table.
//!
//! Every field has a default so a partial JSON file is enough to override a
//! single knob.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::KnowgraphResult;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "KNOWGRAPH_CONFIG";

/// Minimum co-edit count for an edge to join a cluster.
pub const CO_EDIT_CLUSTER_THRESHOLD: i64 = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceConfig {
    pub access_weight: f64,
    pub edit_weight: f64,
    pub discussion_weight: f64,
    pub recency_weight: f64,
    /// Hours after which the recency component halves.
    pub half_life_hours: f64,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            access_weight: 0.25,
            edit_weight: 0.35,
            discussion_weight: 0.15,
            recency_weight: 0.25,
            half_life_hours: 168.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub min_similarity: f64,
    pub duplicate_threshold: f64,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.3,
            duplicate_threshold: 0.85,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRankingConfig {
    /// Language -> languages whose history counts at the reduced weight.
    pub related_languages: BTreeMap<String, BTreeSet<String>>,
    pub related_language_weight: f64,
    /// Known VRAM requirement per model name, in GB.
    pub vram_catalog_gb: BTreeMap<String, f64>,
}

impl Default for ModelRankingConfig {
    fn default() -> Self {
        Self {
            related_languages: default_related_languages(),
            related_language_weight: 0.5,
            vram_catalog_gb: BTreeMap::new(),
        }
    }
}

impl ModelRankingConfig {
    /// True when `other`'s history should count for `language` at the reduced
    /// weight. The table is read in both directions.
    pub fn are_related(&self, language: &str, other: &str) -> bool {
        let language = language.to_lowercase();
        let other = other.to_lowercase();
        let forward = self
            .related_languages
            .get(&language)
            .is_some_and(|set| set.contains(&other));
        let backward = self
            .related_languages
            .get(&other)
            .is_some_and(|set| set.contains(&language));
        forward || backward
    }
}

fn default_related_languages() -> BTreeMap<String, BTreeSet<String>> {
    let groups: &[(&str, &[&str])] = &[
        ("csharp", &["fsharp", "vbnet"]),
        ("typescript", &["javascript"]),
        ("javascript", &["typescript"]),
        ("c", &["cpp"]),
        ("cpp", &["c"]),
        ("java", &["kotlin", "scala"]),
        ("kotlin", &["java"]),
    ];
    groups
        .iter()
        .map(|(lang, related)| {
            (
                lang.to_string(),
                related.iter().map(|r| r.to_string()).collect(),
            )
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub workers: usize,
    pub excluded_dirs: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            excluded_dirs: ["bin", "obj", ".git", ".vs", "node_modules"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub importance: ImportanceConfig,
    pub qa: QaConfig,
    pub models: ModelRankingConfig,
    pub indexing: IndexingConfig,
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> KnowgraphResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> KnowgraphResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Load from the file named by `KNOWGRAPH_CONFIG`, or defaults when unset.
    pub fn from_env() -> KnowgraphResult<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = EngineConfig::default();
        let w = &cfg.importance;
        assert!((w.access_weight + w.edit_weight + w.discussion_weight + w.recency_weight - 1.0).abs() < 1e-9);
        assert_eq!(w.half_life_hours, 168.0);
        assert_eq!(cfg.qa.min_similarity, 0.3);
        assert_eq!(cfg.qa.duplicate_threshold, 0.85);
        assert_eq!(cfg.models.related_language_weight, 0.5);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg = EngineConfig::from_json(r#"{"qa": {"min_similarity": 0.5}}"#).unwrap();
        assert_eq!(cfg.qa.min_similarity, 0.5);
        assert_eq!(cfg.qa.duplicate_threshold, 0.85);
        assert_eq!(cfg.indexing.workers, 4);
    }

    #[test]
    fn related_languages_are_symmetric_and_case_insensitive() {
        let cfg = ModelRankingConfig::default();
        assert!(cfg.are_related("CSharp", "fsharp"));
        assert!(cfg.are_related("fsharp", "csharp"));
        assert!(!cfg.are_related("csharp", "python"));
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowgraph.json");
        std::fs::write(&path, r#"{"indexing": {"workers": 2}}"#).unwrap();
        let cfg = EngineConfig::from_file(&path).unwrap();
        assert_eq!(cfg.indexing.workers, 2);
        assert!(cfg.indexing.excluded_dirs.contains(&"obj".to_string()));
    }
}
