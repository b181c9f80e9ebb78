//! Q&A entries, model performance records and task failure lessons.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::models::{ComplexityBucket, ModelPerformanceRecord, Outcome, QaEntry, TaskFailureLesson};
use crate::store::database::{
    conversion_error, json_list_column, time_column, to_db_time, Database, UnknownValue,
};

fn qa_from_row(row: &Row<'_>) -> rusqlite::Result<QaEntry> {
    Ok(QaEntry {
        id: row.get(0)?,
        question: row.get(1)?,
        answer: row.get(2)?,
        relevant_files: json_list_column(row, 3)?,
        context: row.get(4)?,
        times_asked: row.get(5)?,
        created_at: time_column(row, 6)?,
        last_asked_at: time_column(row, 7)?,
    })
}

const QA_COLUMNS: &str =
    "id, question, answer, relevant_files_json, context, times_asked, created_at, last_asked_at";

fn load_qa(conn: &Connection, id: i64) -> KnowgraphResult<Option<QaEntry>> {
    Ok(conn
        .query_row(
            &format!("SELECT {QA_COLUMNS} FROM qa_entries WHERE id = ?1;"),
            params![id],
            qa_from_row,
        )
        .optional()?)
}

fn qa_entries_in(conn: &Connection, context: &str) -> KnowgraphResult<Vec<QaEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {QA_COLUMNS} FROM qa_entries WHERE context = ?1 ORDER BY id;"
    ))?;
    let rows = stmt
        .query_map(params![context], qa_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn insert_qa_in(
    conn: &Connection,
    context: &str,
    question: &str,
    answer: &str,
    relevant_files: &[String],
    now: DateTime<Utc>,
) -> KnowgraphResult<QaEntry> {
    let files_json = serde_json::to_string(relevant_files)?;
    conn.execute(
        "INSERT INTO qa_entries (context, question, answer, relevant_files_json, \
                                 times_asked, created_at, last_asked_at) \
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5);",
        params![context, question, answer, files_json, to_db_time(&now)],
    )?;
    let id = conn.last_insert_rowid();
    load_qa(conn, id)?
        .ok_or_else(|| KnowgraphError::InvalidInput(format!("qa entry {id} vanished after insert")))
}

fn repeat_question_in(
    conn: &Connection,
    id: i64,
    answer: &str,
    relevant_files: &[String],
    now: DateTime<Utc>,
) -> KnowgraphResult<QaEntry> {
    let files_json = serde_json::to_string(relevant_files)?;
    let changed = conn.execute(
        "UPDATE qa_entries SET times_asked = times_asked + 1, last_asked_at = ?2, \
                answer = ?3, relevant_files_json = ?4 \
         WHERE id = ?1;",
        params![id, to_db_time(&now), answer, files_json],
    )?;
    if changed == 0 {
        return Err(KnowgraphError::InvalidInput(format!("unknown qa entry {id}")));
    }
    load_qa(conn, id)?
        .ok_or_else(|| KnowgraphError::InvalidInput(format!("unknown qa entry {id}")))
}

fn model_record_from_row(row: &Row<'_>) -> rusqlite::Result<ModelPerformanceRecord> {
    let complexity_raw: String = row.get(3)?;
    let complexity = ComplexityBucket::parse(&complexity_raw).ok_or_else(|| {
        conversion_error(
            3,
            UnknownValue {
                what: "complexity",
                value: complexity_raw.clone(),
            },
        )
    })?;
    let outcome_raw: String = row.get(4)?;
    let outcome = Outcome::parse(&outcome_raw).ok_or_else(|| {
        conversion_error(
            4,
            UnknownValue {
                what: "outcome",
                value: outcome_raw.clone(),
            },
        )
    })?;
    Ok(ModelPerformanceRecord {
        model: row.get(0)?,
        task_type: row.get(1)?,
        language: row.get(2)?,
        complexity,
        outcome,
        score: row.get(5)?,
        duration_ms: row.get(6)?,
        iterations: row.get(7)?,
        error_type: row.get(8)?,
        context: row.get(9)?,
        keywords: json_list_column(row, 10)?,
        recorded_at: time_column(row, 11)?,
    })
}

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<TaskFailureLesson> {
    Ok(TaskFailureLesson {
        task_description: row.get(0)?,
        keywords: json_list_column(row, 1)?,
        language: row.get(2)?,
        failure_phase: row.get(3)?,
        error_pattern: row.get(4)?,
        error_message: row.get(5)?,
        approaches_tried: json_list_column(row, 6)?,
        models_used: json_list_column(row, 7)?,
        lesson: row.get(8)?,
        context: row.get(9)?,
        recorded_at: time_column(row, 10)?,
    })
}

impl Database {
    // -----------------------------------------------------------------------
    // Q&A
    // -----------------------------------------------------------------------

    pub fn insert_qa(
        &self,
        context: &str,
        question: &str,
        answer: &str,
        relevant_files: &[String],
        now: DateTime<Utc>,
    ) -> KnowgraphResult<QaEntry> {
        self.write(|tx| insert_qa_in(tx, context, question, answer, relevant_files, now))
    }

    /// Count one more ask of entry `id`, replacing its answer and file list.
    pub fn record_repeat_question(
        &self,
        id: i64,
        answer: &str,
        relevant_files: &[String],
        now: DateTime<Utc>,
    ) -> KnowgraphResult<QaEntry> {
        self.write(|tx| repeat_question_in(tx, id, answer, relevant_files, now))
    }

    /// Insert a question, or fold it into the entry `find_duplicate` picks
    /// among the stored entries of `context`. The lookup and the write run
    /// in one IMMEDIATE transaction. A merged entry keeps its files first,
    /// followed by any new ones. Returns the entry and whether it merged.
    #[allow(clippy::too_many_arguments)]
    pub fn store_or_merge_qa(
        &self,
        context: &str,
        question: &str,
        answer: &str,
        relevant_files: &[String],
        now: DateTime<Utc>,
        find_duplicate: impl FnOnce(Vec<QaEntry>) -> Option<QaEntry>,
    ) -> KnowgraphResult<(QaEntry, bool)> {
        self.write(|tx| match find_duplicate(qa_entries_in(tx, context)?) {
            Some(existing) => {
                let files: Vec<String> = existing
                    .relevant_files
                    .iter()
                    .chain(relevant_files)
                    .cloned()
                    .collect::<IndexSet<String>>()
                    .into_iter()
                    .collect();
                let entry = repeat_question_in(tx, existing.id, answer, &files, now)?;
                Ok((entry, true))
            }
            None => {
                let files: Vec<String> = relevant_files
                    .iter()
                    .cloned()
                    .collect::<IndexSet<String>>()
                    .into_iter()
                    .collect();
                let entry = insert_qa_in(tx, context, question, answer, &files, now)?;
                Ok((entry, false))
            }
        })
    }

    pub fn qa_entries(&self, context: &str) -> KnowgraphResult<Vec<QaEntry>> {
        self.read(|conn| qa_entries_in(conn, context))
    }

    // -----------------------------------------------------------------------
    // Model performance
    // -----------------------------------------------------------------------

    pub fn insert_model_performance(&self, record: &ModelPerformanceRecord) -> KnowgraphResult<()> {
        let keywords_json = serde_json::to_string(&record.keywords)?;
        self.write(|tx| {
            tx.execute(
                "INSERT INTO model_performance (model, task_type, language, complexity, outcome, \
                     score, duration_ms, iterations, error_type, context, keywords_json, recorded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
                params![
                    record.model,
                    record.task_type,
                    record.language,
                    record.complexity.as_str(),
                    record.outcome.as_str(),
                    record.score,
                    record.duration_ms,
                    record.iterations,
                    record.error_type,
                    record.context,
                    keywords_json,
                    to_db_time(&record.recorded_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Records of `task_type`, optionally narrowed to one complexity bucket
    /// and one context. Language filtering is left to the ranking layer.
    pub fn model_performance_for_task(
        &self,
        task_type: &str,
        complexity: Option<ComplexityBucket>,
        context: Option<&str>,
    ) -> KnowgraphResult<Vec<ModelPerformanceRecord>> {
        let complexity = complexity.map(|c| c.as_str());
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT model, task_type, language, complexity, outcome, score, duration_ms, \
                        iterations, error_type, context, keywords_json, recorded_at \
                 FROM model_performance \
                 WHERE task_type = ?1 \
                   AND (?2 IS NULL OR complexity = ?2) \
                   AND (?3 IS NULL OR context = ?3) \
                 ORDER BY recorded_at DESC, id DESC;",
            )?;
            let rows = stmt
                .query_map(params![task_type, complexity, context], model_record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -----------------------------------------------------------------------
    // Task failures
    // -----------------------------------------------------------------------

    pub fn insert_task_failure(&self, lesson: &TaskFailureLesson) -> KnowgraphResult<()> {
        let keywords_json = serde_json::to_string(&lesson.keywords)?;
        let approaches_json = serde_json::to_string(&lesson.approaches_tried)?;
        let models_json = serde_json::to_string(&lesson.models_used)?;
        self.write(|tx| {
            tx.execute(
                "INSERT INTO task_failures (task_description, keywords_json, language, failure_phase, \
                     error_pattern, error_message, approaches_tried_json, models_used_json, lesson, \
                     context, recorded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    lesson.task_description,
                    keywords_json,
                    lesson.language,
                    lesson.failure_phase,
                    lesson.error_pattern,
                    lesson.error_message,
                    approaches_json,
                    models_json,
                    lesson.lesson,
                    lesson.context,
                    to_db_time(&lesson.recorded_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Lessons newest first. A given `language` or `context` keeps rows that
    /// match it or carry none.
    pub fn task_failures(
        &self,
        language: Option<&str>,
        context: Option<&str>,
    ) -> KnowgraphResult<Vec<TaskFailureLesson>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_description, keywords_json, language, failure_phase, error_pattern, \
                        error_message, approaches_tried_json, models_used_json, lesson, context, \
                        recorded_at \
                 FROM task_failures \
                 WHERE (?1 IS NULL OR language IS NULL OR lower(language) = lower(?1)) \
                   AND (?2 IS NULL OR context IS NULL OR context = ?2) \
                 ORDER BY recorded_at DESC, id DESC;",
            )?;
            let rows = stmt
                .query_map(params![language, context], lesson_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("history.db")).unwrap();
        (dir, db)
    }

    fn run(model: &str, task: &str, outcome: Outcome, at: DateTime<Utc>) -> ModelPerformanceRecord {
        ModelPerformanceRecord {
            model: model.to_string(),
            task_type: task.to_string(),
            language: Some("csharp".to_string()),
            complexity: ComplexityBucket::Moderate,
            outcome,
            score: 0.8,
            duration_ms: 1200,
            iterations: 2,
            error_type: None,
            context: Some("ctx".to_string()),
            keywords: vec!["api".to_string()],
            recorded_at: at,
        }
    }

    #[test]
    fn qa_insert_and_repeat() {
        let (_dir, db) = temp_db();
        let files = vec!["Auth.cs".to_string()];
        let entry = db
            .insert_qa("ctx", "where is login?", "AuthService", &files, Utc::now())
            .unwrap();
        assert_eq!(entry.times_asked, 1);
        assert_eq!(entry.relevant_files, files);

        let merged = vec!["Auth.cs".to_string(), "Login.cs".to_string()];
        let again = db
            .record_repeat_question(entry.id, "AuthService.Login", &merged, Utc::now())
            .unwrap();
        assert_eq!(again.times_asked, 2);
        assert_eq!(again.answer, "AuthService.Login");
        assert_eq!(again.relevant_files, merged);
        assert_eq!(db.qa_entries("ctx").unwrap().len(), 1);
        assert!(db.qa_entries("other").unwrap().is_empty());
        assert!(db.record_repeat_question(999, "x", &[], Utc::now()).is_err());
    }

    #[test]
    fn model_records_filter_by_task_and_bucket() {
        let (_dir, db) = temp_db();
        let now = Utc::now();
        db.insert_model_performance(&run("alpha", "refactor", Outcome::Success, now - Duration::days(2)))
            .unwrap();
        db.insert_model_performance(&run("beta", "refactor", Outcome::Failure, now))
            .unwrap();
        db.insert_model_performance(&run("gamma", "tests", Outcome::Success, now))
            .unwrap();

        let records = db.model_performance_for_task("refactor", None, None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].model, "beta");
        assert_eq!(records[1].outcome, Outcome::Success);

        let simple = db
            .model_performance_for_task("refactor", Some(ComplexityBucket::Simple), None)
            .unwrap();
        assert!(simple.is_empty());
        assert!(db
            .model_performance_for_task("refactor", None, Some("elsewhere"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn task_failures_filter_by_language() {
        let (_dir, db) = temp_db();
        let lesson = TaskFailureLesson {
            task_description: "add caching to repository".to_string(),
            keywords: vec!["cache".to_string()],
            language: Some("csharp".to_string()),
            failure_phase: "build".to_string(),
            error_pattern: "missing_dependency".to_string(),
            error_message: "CS0246".to_string(),
            approaches_tried: vec!["IMemoryCache".to_string()],
            models_used: vec!["alpha".to_string()],
            lesson: "register the cache in DI".to_string(),
            context: None,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
                + Duration::nanoseconds(99_099_196),
        };
        db.insert_task_failure(&lesson).unwrap();
        let mut untagged = lesson.clone();
        untagged.language = None;
        db.insert_task_failure(&untagged).unwrap();

        assert_eq!(db.task_failures(Some("CSharp"), Some("ctx")).unwrap().len(), 2);
        assert_eq!(db.task_failures(Some("python"), None).unwrap().len(), 1);
        let all = db.task_failures(None, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], lesson);
    }
}
