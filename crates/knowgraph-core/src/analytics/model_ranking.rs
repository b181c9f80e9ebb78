//! Historical model-performance ranking.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ModelRankingConfig;
use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::models::{ComplexityBucket, ModelPerformanceRecord, Outcome};
use crate::query::guards::MAX_MODEL_ALTERNATIVES;
use crate::store::Database;

/// Parameter-count tag in a model name, e.g. `coder:14b` or `7B-instruct`.
static PARAM_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)b\b").unwrap());

/// Estimated GB of VRAM per billion parameters when the catalog has no entry.
const GB_PER_BILLION_PARAMS: f64 = 1.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelQuery {
    pub task_type: String,
    pub language: Option<String>,
    pub complexity: Option<ComplexityBucket>,
    pub context: Option<String>,
    pub exclude_models: Vec<String>,
    pub max_vram_gb: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelCandidate {
    pub model: String,
    pub weighted_success_rate: f64,
    pub weighted_average_score: f64,
    pub weighted_attempts: f64,
    pub attempts: usize,
    pub successes: usize,
    pub average_duration_ms: f64,
    pub last_used_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelRecommendation {
    Recommended {
        best: ModelCandidate,
        alternatives: Vec<ModelCandidate>,
        records_considered: usize,
    },
    NoHistoricalData {
        task_type: String,
    },
}

/// 3.0 within a day, 2.0 within a week, 1.0 after that.
pub fn time_decay_weight(recorded_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = now - recorded_at;
    if age <= Duration::hours(24) {
        3.0
    } else if age <= Duration::days(7) {
        2.0
    } else {
        1.0
    }
}

/// Weight of a record's language for a requested one. `None` excludes it.
pub fn language_weight(
    config: &ModelRankingConfig,
    wanted: Option<&str>,
    recorded: Option<&str>,
) -> Option<f64> {
    let Some(wanted) = wanted else {
        return Some(1.0);
    };
    let recorded = recorded?;
    if recorded.eq_ignore_ascii_case(wanted) {
        Some(1.0)
    } else if config.are_related(wanted, recorded) {
        Some(config.related_language_weight)
    } else {
        None
    }
}

/// Catalog entry, else an estimate from a size tag in the name.
pub fn vram_requirement_gb(config: &ModelRankingConfig, model: &str) -> Option<f64> {
    if let Some(gb) = config.vram_catalog_gb.get(model) {
        return Some(*gb);
    }
    let captures = PARAM_SIZE_RE.captures(model)?;
    let billions: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(billions * GB_PER_BILLION_PARAMS)
}

#[derive(Default)]
struct Tally {
    weight: f64,
    success_weight: f64,
    score_weight: f64,
    attempts: usize,
    successes: usize,
    duration_ms: i64,
    last_used_at: Option<DateTime<Utc>>,
}

fn candidate_order(a: &ModelCandidate, b: &ModelCandidate) -> Ordering {
    b.weighted_success_rate
        .partial_cmp(&a.weighted_success_rate)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.weighted_average_score
                .partial_cmp(&a.weighted_average_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| {
            b.weighted_attempts
                .partial_cmp(&a.weighted_attempts)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.model.cmp(&b.model))
}

/// Aggregate already-fetched records for `query` as of `now`.
pub fn rank_models(
    records: &[ModelPerformanceRecord],
    query: &ModelQuery,
    config: &ModelRankingConfig,
    now: DateTime<Utc>,
) -> ModelRecommendation {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut considered = 0;

    for record in records {
        if record.task_type != query.task_type {
            continue;
        }
        if query.complexity.is_some_and(|c| c != record.complexity) {
            continue;
        }
        if query.context.is_some() && record.context != query.context {
            continue;
        }
        if query.exclude_models.iter().any(|m| m == &record.model) {
            continue;
        }
        if let Some(limit) = query.max_vram_gb {
            if vram_requirement_gb(config, &record.model).is_some_and(|need| need > limit) {
                continue;
            }
        }
        let Some(lang_weight) =
            language_weight(config, query.language.as_deref(), record.language.as_deref())
        else {
            continue;
        };
        let weight = time_decay_weight(record.recorded_at, now) * lang_weight;
        if weight <= 0.0 {
            continue;
        }

        considered += 1;
        let tally = tallies.entry(record.model.as_str()).or_default();
        tally.weight += weight;
        tally.score_weight += record.score * weight;
        tally.attempts += 1;
        tally.duration_ms += record.duration_ms;
        if record.outcome == Outcome::Success {
            tally.success_weight += weight;
            tally.successes += 1;
        }
        if tally.last_used_at.map_or(true, |last| record.recorded_at > last) {
            tally.last_used_at = Some(record.recorded_at);
        }
    }

    let mut candidates: Vec<ModelCandidate> = tallies
        .into_iter()
        .filter_map(|(model, t)| {
            Some(ModelCandidate {
                model: model.to_string(),
                weighted_success_rate: t.success_weight / t.weight,
                weighted_average_score: t.score_weight / t.weight,
                weighted_attempts: t.weight,
                attempts: t.attempts,
                successes: t.successes,
                average_duration_ms: t.duration_ms as f64 / t.attempts as f64,
                last_used_at: t.last_used_at?,
            })
        })
        .collect();
    candidates.sort_by(candidate_order);

    let mut ranked = candidates.into_iter();
    match ranked.next() {
        Some(best) => ModelRecommendation::Recommended {
            best,
            alternatives: ranked.take(MAX_MODEL_ALTERNATIVES).collect(),
            records_considered: considered,
        },
        None => ModelRecommendation::NoHistoricalData {
            task_type: query.task_type.clone(),
        },
    }
}

pub fn validate_record(record: &ModelPerformanceRecord) -> KnowgraphResult<()> {
    if record.model.trim().is_empty() {
        return Err(KnowgraphError::InvalidInput("model name is empty".to_string()));
    }
    if record.task_type.trim().is_empty() {
        return Err(KnowgraphError::InvalidInput("task type is empty".to_string()));
    }
    if !record.score.is_finite() {
        return Err(KnowgraphError::InvalidInput(format!(
            "score must be finite, got {}",
            record.score
        )));
    }
    Ok(())
}

pub fn record_model_performance(db: &Database, record: &ModelPerformanceRecord) -> KnowgraphResult<()> {
    validate_record(record)?;
    db.insert_model_performance(record)
}

pub fn query_best_model(
    db: &Database,
    query: &ModelQuery,
    config: &ModelRankingConfig,
    now: DateTime<Utc>,
) -> KnowgraphResult<ModelRecommendation> {
    let records = db.model_performance_for_task(
        &query.task_type,
        query.complexity,
        query.context.as_deref(),
    )?;
    Ok(rank_models(&records, query, config, now))
}
