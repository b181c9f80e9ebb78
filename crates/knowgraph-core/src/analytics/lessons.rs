//! Failure-lesson retrieval and remediation suggestions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::analytics::similarity::tokenize;
use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::models::TaskFailureLesson;
use crate::query::guards::{clamp_limit, MAX_RESULT_LIMIT};
use crate::store::Database;

/// Error-pattern fragment -> alternative tactics.
const TACTICS: &[(&str, &[&str])] = &[
    ("compil", &[
        "Build after every small change and fix the first compiler error before the rest",
        "Check the exact signatures of the APIs being called",
    ]),
    ("missing_dependency", &[
        "Register the dependency in the DI container before injecting it",
        "Verify the package reference and namespace import",
    ]),
    ("null", &[
        "Add guard clauses for nullable inputs",
        "Enable nullable reference types and follow the warnings",
    ]),
    ("timeout", &[
        "Split the work into smaller batches",
        "Add cancellation and make long calls asynchronous",
    ]),
    ("test", &[
        "Reproduce the failing test in isolation before changing code",
        "Write a focused failing test that pins down the expected behavior",
    ]),
    ("type", &[
        "Follow the declared types instead of relying on inference",
        "Introduce an explicit conversion or adapter at the boundary",
    ]),
    ("syntax", &[
        "Generate smaller code fragments and validate each one",
    ]),
    ("context", &[
        "Narrow the prompt to the files that matter",
        "Summarize large files instead of including them whole",
    ]),
    ("hallucinat", &[
        "Look up the real API in the codebase before using it",
        "Ground the change in an existing working example",
    ]),
];

const GENERIC_TACTICS: &[&str] = &[
    "Break the task into smaller, independently verifiable steps",
    "Study similar working code in the codebase before changing it",
    "Try a model with a stronger track record for this task type",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonQuery {
    pub task_description: String,
    pub keywords: Vec<String>,
    pub language: Option<String>,
    pub context: Option<String>,
    pub limit: i64,
}

impl Default for LessonQuery {
    fn default() -> Self {
        Self {
            task_description: String::new(),
            keywords: Vec::new(),
            language: None,
            context: None,
            limit: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedLesson {
    pub lesson: TaskFailureLesson,
    pub overlap: f64,
    pub relevance: f64,
}

/// "What to avoid" guidance for one error pattern.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatternGuidance {
    pub error_pattern: String,
    pub occurrences: usize,
    pub most_recent_message: String,
    pub lesson: String,
    pub approaches_tried: Vec<String>,
    pub models_used: Vec<String>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LessonReport {
    pub query_keywords: Vec<String>,
    pub lessons: Vec<RankedLesson>,
    pub what_to_avoid: Vec<PatternGuidance>,
    pub suggested_approaches: Vec<String>,
}

/// 2.0 within a week, 1.5 within 30 days, 1.0 after that.
pub fn recency_boost(recorded_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = now - recorded_at;
    if age <= Duration::days(7) {
        2.0
    } else if age <= Duration::days(30) {
        1.5
    } else {
        1.0
    }
}

/// Given keywords plus tokens of the description, lower-cased.
pub fn query_keywords(description: &str, keywords: &[String]) -> BTreeSet<String> {
    let mut out = tokenize(description);
    out.extend(
        keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty()),
    );
    out
}

fn lesson_keywords(lesson: &TaskFailureLesson) -> BTreeSet<String> {
    query_keywords(&lesson.task_description, &lesson.keywords)
}

fn tactics_for(pattern: &str) -> Vec<&'static str> {
    let pattern = pattern.to_lowercase();
    TACTICS
        .iter()
        .filter(|(fragment, _)| pattern.contains(fragment))
        .flat_map(|(_, tactics)| tactics.iter().copied())
        .collect()
}

fn group_by_pattern(ranked: &[RankedLesson]) -> Vec<PatternGuidance> {
    let mut groups: BTreeMap<&str, Vec<&TaskFailureLesson>> = BTreeMap::new();
    for item in ranked {
        groups
            .entry(item.lesson.error_pattern.as_str())
            .or_default()
            .push(&item.lesson);
    }
    let mut guidance: Vec<PatternGuidance> = groups
        .into_iter()
        .filter_map(|(pattern, lessons)| {
            let latest = lessons.iter().max_by_key(|l| l.recorded_at)?;
            let approaches: IndexSet<&str> = lessons
                .iter()
                .flat_map(|l| l.approaches_tried.iter().map(String::as_str))
                .collect();
            let models: IndexSet<&str> = lessons
                .iter()
                .flat_map(|l| l.models_used.iter().map(String::as_str))
                .collect();
            Some(PatternGuidance {
                error_pattern: pattern.to_string(),
                occurrences: lessons.len(),
                most_recent_message: latest.error_message.clone(),
                lesson: latest.lesson.clone(),
                approaches_tried: approaches.into_iter().map(str::to_string).collect(),
                models_used: models.into_iter().map(str::to_string).collect(),
                last_seen_at: latest.recorded_at,
            })
        })
        .collect();
    guidance.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
            .then_with(|| a.error_pattern.cmp(&b.error_pattern))
    });
    guidance
}

fn suggest(guidance: &[PatternGuidance]) -> Vec<String> {
    let tried: BTreeSet<String> = guidance
        .iter()
        .flat_map(|g| g.approaches_tried.iter().map(|a| a.trim().to_lowercase()))
        .collect();
    let mut suggestions: IndexSet<&str> = guidance
        .iter()
        .flat_map(|g| tactics_for(&g.error_pattern))
        .collect();
    if suggestions.is_empty() {
        suggestions.extend(GENERIC_TACTICS.iter().copied());
    }
    suggestions
        .into_iter()
        .filter(|s| !tried.contains(&s.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Rank `lessons` for `query` as of `now`.
pub fn rank_lessons(lessons: Vec<TaskFailureLesson>, query: &LessonQuery, now: DateTime<Utc>) -> LessonReport {
    let wanted = query_keywords(&query.task_description, &query.keywords);

    let mut ranked: Vec<RankedLesson> = lessons
        .into_iter()
        .filter_map(|lesson| {
            let overlap = if wanted.is_empty() {
                0.0
            } else {
                let shared = lesson_keywords(&lesson).intersection(&wanted).count();
                if shared == 0 {
                    return None;
                }
                shared as f64 / wanted.len() as f64
            };
            let relevance = (overlap + 0.5) * recency_boost(lesson.recorded_at, now);
            Some(RankedLesson {
                lesson,
                overlap,
                relevance,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.lesson.recorded_at.cmp(&a.lesson.recorded_at))
    });

    let what_to_avoid = group_by_pattern(&ranked);
    let suggested_approaches = suggest(&what_to_avoid);
    ranked.truncate(clamp_limit(query.limit, MAX_RESULT_LIMIT) as usize);

    LessonReport {
        query_keywords: wanted.into_iter().collect(),
        lessons: ranked,
        what_to_avoid,
        suggested_approaches,
    }
}

pub fn store_task_failure(db: &Database, lesson: &TaskFailureLesson) -> KnowgraphResult<()> {
    if lesson.task_description.trim().is_empty() {
        return Err(KnowgraphError::InvalidInput("task description is empty".to_string()));
    }
    if lesson.error_pattern.trim().is_empty() {
        return Err(KnowgraphError::InvalidInput("error pattern is empty".to_string()));
    }
    db.insert_task_failure(lesson)
}

pub fn query_task_lessons(db: &Database, query: &LessonQuery, now: DateTime<Utc>) -> KnowgraphResult<LessonReport> {
    let lessons = db.task_failures(query.language.as_deref(), query.context.as_deref())?;
    Ok(rank_lessons(lessons, query, now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(description: &str, pattern: &str, tried: &[&str], age: Duration, now: DateTime<Utc>) -> TaskFailureLesson {
        TaskFailureLesson {
            task_description: description.to_string(),
            keywords: vec![],
            language: Some("csharp".to_string()),
            failure_phase: "build".to_string(),
            error_pattern: pattern.to_string(),
            error_message: format!("{pattern} at {}", age.num_days()),
            approaches_tried: tried.iter().map(|s| s.to_string()).collect(),
            models_used: vec!["alpha".to_string()],
            lesson: format!("lesson for {pattern}"),
            context: None,
            recorded_at: now - age,
        }
    }

    #[test]
    fn boosts_by_age() {
        let now = Utc::now();
        assert_eq!(recency_boost(now - Duration::days(1), now), 2.0);
        assert_eq!(recency_boost(now - Duration::days(20), now), 1.5);
        assert_eq!(recency_boost(now - Duration::days(90), now), 1.0);
    }

    #[test]
    fn relevance_combines_overlap_and_recency() {
        let now = Utc::now();
        let lessons = vec![
            lesson("add redis cache to repository", "timeout", &[], Duration::days(60), now),
            lesson("add redis cache to repository", "timeout", &[], Duration::days(2), now),
            lesson("render invoice pdf", "null_reference", &[], Duration::days(1), now),
        ];
        let query = LessonQuery {
            task_description: "cache the repository".to_string(),
            ..LessonQuery::default()
        };
        let report = rank_lessons(lessons, &query, now);
        assert_eq!(report.lessons.len(), 2);
        // overlap = 2/2 -> (1.0 + 0.5) * 2.0
        assert!((report.lessons[0].relevance - 3.0).abs() < 1e-12);
        assert!((report.lessons[1].relevance - 1.5).abs() < 1e-12);
        assert_eq!(report.what_to_avoid.len(), 1);
        assert_eq!(report.what_to_avoid[0].occurrences, 2);
        assert_eq!(report.what_to_avoid[0].most_recent_message, "timeout at 2");
    }

    #[test]
    fn suggestions_skip_tried_approaches_and_fall_back() {
        let now = Utc::now();
        let tried = "Split the work into smaller batches";
        let report = rank_lessons(
            vec![lesson("sync orders", "timeout", &[tried], Duration::days(1), now)],
            &LessonQuery {
                keywords: vec!["orders".to_string()],
                ..LessonQuery::default()
            },
            now,
        );
        assert!(!report.suggested_approaches.iter().any(|s| s == tried));
        assert!(report
            .suggested_approaches
            .iter()
            .any(|s| s.contains("cancellation")));

        let generic = rank_lessons(
            vec![lesson("sync orders", "weird_failure", &[], Duration::days(1), now)],
            &LessonQuery::default(),
            now,
        );
        assert_eq!(generic.suggested_approaches.len(), GENERIC_TACTICS.len());
    }

    #[test]
    fn empty_query_keeps_every_lesson() {
        let now = Utc::now();
        let report = rank_lessons(
            vec![lesson("anything", "timeout", &[], Duration::days(90), now)],
            &LessonQuery::default(),
            now,
        );
        assert_eq!(report.lessons.len(), 1);
        assert!((report.lessons[0].relevance - 0.5).abs() < 1e-12);
    }
}
