//! Decay-weighted file importance.
//!
//! score = w_a·A + w_e·E + w_d·D + w_r·R, clamped to [0, 1], where A, E and D
//! are the file's counters normalised by the context maximum and
//! R = 2^(−hours_since_last_access / half_life).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::config::ImportanceConfig;
use crate::errors::KnowgraphResult;
use crate::models::FileImportance;
use crate::query::guards::{clamp_limit, MAX_RESULT_LIMIT};
use crate::store::Database;

/// Largest value of each counter within one context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterMaxima {
    pub access: i64,
    pub edit: i64,
    pub discussion: i64,
}

impl CounterMaxima {
    pub fn of(rows: &[FileImportance]) -> Self {
        rows.iter().fold(Self::default(), |acc, row| Self {
            access: acc.access.max(row.access_count),
            edit: acc.edit.max(row.edit_count),
            discussion: acc.discussion.max(row.discussion_count),
        })
    }
}

fn ratio(value: i64, maximum: i64) -> f64 {
    if maximum <= 0 {
        0.0
    } else {
        (value.max(0) as f64 / maximum as f64).clamp(0.0, 1.0)
    }
}

/// Exponential decay with the given half-life. Never-accessed files score 0.
pub fn recency_factor(
    last_accessed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    half_life_hours: f64,
) -> f64 {
    let Some(last) = last_accessed_at else {
        return 0.0;
    };
    if half_life_hours <= 0.0 {
        return 0.0;
    }
    let hours = ((now - last).num_milliseconds().max(0) as f64) / 3_600_000.0;
    2f64.powf(-hours / half_life_hours).clamp(0.0, 1.0)
}

pub fn importance_score(
    row: &FileImportance,
    maxima: &CounterMaxima,
    config: &ImportanceConfig,
    now: DateTime<Utc>,
) -> f64 {
    let score = config.access_weight * ratio(row.access_count, maxima.access)
        + config.edit_weight * ratio(row.edit_count, maxima.edit)
        + config.discussion_weight * ratio(row.discussion_count, maxima.discussion)
        + config.recency_weight * recency_factor(row.last_accessed_at, now, config.half_life_hours);
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn by_score_desc(a: &FileImportance, b: &FileImportance) -> Ordering {
    b.importance_score
        .partial_cmp(&a.importance_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.file_path.cmp(&b.file_path))
}

/// Recompute and persist every score of `context` as of `now`. Returns the
/// rows, highest score first.
pub fn recalculate_importance(
    db: &Database,
    context: &str,
    config: &ImportanceConfig,
    now: DateTime<Utc>,
) -> KnowgraphResult<Vec<FileImportance>> {
    let mut rows = db.importance_rows(context)?;
    let maxima = CounterMaxima::of(&rows);
    for row in &mut rows {
        row.importance_score = importance_score(row, &maxima, config, now);
        row.recalculated_at = Some(now);
    }
    let scores: Vec<(String, f64)> = rows
        .iter()
        .map(|row| (row.file_path.clone(), row.importance_score))
        .collect();
    db.update_importance_scores(context, &scores, now)?;
    tracing::info!(context, files = rows.len(), "recalculated file importance");

    rows.sort_by(by_score_desc);
    Ok(rows)
}

/// Stored scores, highest first; `limit` is clamped to `1..=MAX_RESULT_LIMIT`.
pub fn most_important_files(
    db: &Database,
    context: &str,
    limit: i64,
) -> KnowgraphResult<Vec<FileImportance>> {
    let mut rows = db.importance_rows(context)?;
    rows.sort_by(by_score_desc);
    rows.truncate(clamp_limit(limit, MAX_RESULT_LIMIT) as usize);
    Ok(rows)
}
