//! Question/answer recall.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::similarity::TextSimilarity;
use crate::config::QaConfig;
use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::models::QaEntry;
use crate::query::guards::{clamp_limit, truncate_text, MAX_QA_RESULTS, MAX_QUESTION_LENGTH};
use crate::store::Database;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QaMatch {
    pub entry: QaEntry,
    pub similarity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredQa {
    pub entry: QaEntry,
    /// True when an existing near-identical question absorbed this one.
    pub merged: bool,
}

fn normalized_question(question: &str) -> KnowgraphResult<String> {
    let question = truncate_text(question, MAX_QUESTION_LENGTH);
    if question.is_empty() {
        return Err(KnowgraphError::InvalidInput("question is empty".to_string()));
    }
    Ok(question)
}

fn rank(
    entries: Vec<QaEntry>,
    similarity: &dyn TextSimilarity,
    question: &str,
    min_similarity: f64,
) -> Vec<QaMatch> {
    let mut matches: Vec<QaMatch> = entries
        .into_iter()
        .filter_map(|entry| {
            let score = similarity.similarity(question, &entry.question);
            (score.is_finite() && score >= min_similarity).then_some(QaMatch {
                entry,
                similarity: score.clamp(0.0, 1.0),
            })
        })
        .collect();
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.entry.times_asked.cmp(&a.entry.times_asked))
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    matches
}

/// Stored questions of `context` at least `min_similarity` close to
/// `question`, best first, at most `limit` (clamped to `MAX_QA_RESULTS`).
pub fn find_similar_questions(
    db: &Database,
    similarity: &dyn TextSimilarity,
    config: &QaConfig,
    question: &str,
    context: &str,
    limit: i64,
) -> KnowgraphResult<Vec<QaMatch>> {
    let question = normalized_question(question)?;
    let mut matches = rank(db.qa_entries(context)?, similarity, &question, config.min_similarity);
    matches.truncate(clamp_limit(limit, MAX_QA_RESULTS) as usize);
    Ok(matches)
}

/// Insert a Q&A pair, or fold it into the best existing match when that
/// match scores at least `duplicate_threshold`. The duplicate lookup sees
/// every entry committed before this call's write transaction began.
#[allow(clippy::too_many_arguments)]
pub fn store_qa(
    db: &Database,
    similarity: &dyn TextSimilarity,
    config: &QaConfig,
    context: &str,
    question: &str,
    answer: &str,
    relevant_files: &[String],
    now: DateTime<Utc>,
) -> KnowgraphResult<StoredQa> {
    let question = normalized_question(question)?;
    let (entry, merged) =
        db.store_or_merge_qa(context, &question, answer, relevant_files, now, |entries| {
            rank(entries, similarity, &question, config.duplicate_threshold)
                .into_iter()
                .next()
                .map(|best| best.entry)
        })?;
    Ok(StoredQa { entry, merged })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::similarity::JaccardSimilarity;

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn near_duplicates_merge_and_distinct_questions_insert() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("qa.db")).unwrap();
        let sim = JaccardSimilarity;
        let config = QaConfig::default();

        let first = store_qa(
            &db, &sim, &config, "ctx",
            "Where is the order repository registered?",
            "Program.cs", &files(&["Program.cs"]), Utc::now(),
        )
        .unwrap();
        assert!(!first.merged);

        let again = store_qa(
            &db, &sim, &config, "ctx",
            "where is the order repository registered",
            "Startup.ConfigureServices", &files(&["Startup.cs", "Program.cs"]), Utc::now(),
        )
        .unwrap();
        assert!(again.merged);
        assert_eq!(again.entry.id, first.entry.id);
        assert_eq!(again.entry.times_asked, 2);
        assert_eq!(again.entry.answer, "Startup.ConfigureServices");
        assert_eq!(again.entry.relevant_files, files(&["Program.cs", "Startup.cs"]));

        let other = store_qa(
            &db, &sim, &config, "ctx",
            "How are invoices rendered to PDF?",
            "InvoiceRenderer", &[], Utc::now(),
        )
        .unwrap();
        assert!(!other.merged);
    }

    #[test]
    fn concurrent_askers_of_one_question_share_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("qa.db")).unwrap();
        let config = QaConfig::default();
        const ASKERS: i64 = 8;

        std::thread::scope(|scope| {
            for i in 0..ASKERS {
                let db = db.clone();
                let config = &config;
                scope.spawn(move || {
                    store_qa(
                        &db, &JaccardSimilarity, config, "ctx",
                        "Where is the order repository registered?",
                        "Program.cs", &[format!("File{i}.cs")], Utc::now(),
                    )
                    .unwrap();
                });
            }
        });

        let entries = db.qa_entries("ctx").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].times_asked, ASKERS);
        assert_eq!(entries[0].relevant_files.len(), ASKERS as usize);
    }

    #[test]
    fn recall_filters_by_minimum_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("qa.db")).unwrap();
        let sim = JaccardSimilarity;
        let config = QaConfig::default();
        store_qa(&db, &sim, &config, "ctx", "order repository registration", "a", &[], Utc::now())
            .unwrap();
        store_qa(&db, &sim, &config, "ctx", "invoice pdf rendering", "b", &[], Utc::now())
            .unwrap();

        let hits = find_similar_questions(&db, &sim, &config, "order repository", "ctx", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.answer, "a");
        assert!(hits[0].similarity >= config.min_similarity);
        assert!(find_similar_questions(&db, &sim, &config, "order repository", "other", 10)
            .unwrap()
            .is_empty());
        assert!(matches!(
            find_similar_questions(&db, &sim, &config, "   ", "ctx", 10),
            Err(KnowgraphError::InvalidInput(_))
        ));
    }
}
