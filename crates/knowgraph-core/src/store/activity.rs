//! File activity counters, co-edit pairs and sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::models::{CoEditEdge, FileImportance, Session};
use crate::store::database::{optional_time_column, time_column, to_db_time, Database};

/// Which counter a file event bumps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileEvent {
    Access,
    Edit,
    Discussion,
}

impl FileEvent {
    fn counter_column(self) -> &'static str {
        match self {
            FileEvent::Access => "access_count",
            FileEvent::Edit => "edit_count",
            FileEvent::Discussion => "discussion_count",
        }
    }

    /// Value stored in `session_activity.activity`.
    fn activity(self) -> &'static str {
        match self {
            FileEvent::Access => "accessed",
            FileEvent::Edit => "edited",
            FileEvent::Discussion => "discussed",
        }
    }
}

/// Raw co-edit rows of a context plus each file's edit count.
#[derive(Clone, Debug, Default)]
pub struct CoEditCounts {
    /// `strength` is left at 0.0; it is derived by the analytics layer.
    pub edges: Vec<CoEditEdge>,
    pub edit_counts: HashMap<String, i64>,
}

fn session_error(message: String) -> KnowgraphError {
    KnowgraphError::InvalidSessionState(message)
}

/// Fail unless `session_id` names a session that is still active and, when
/// `context` is given, belongs to it.
fn require_active_session(
    conn: &Connection,
    session_id: &str,
    context: Option<&str>,
) -> KnowgraphResult<()> {
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT context, ended_at FROM sessions WHERE id = ?1;",
            params![session_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        None => Err(session_error(format!("unknown session {session_id}"))),
        Some((_, Some(_))) => Err(session_error(format!("session {session_id} has ended"))),
        Some((owner, None)) => match context {
            Some(ctx) if ctx != owner => Err(session_error(format!(
                "session {session_id} belongs to context {owner}, not {ctx}"
            ))),
            _ => Ok(()),
        },
    }
}

fn active_session_id(conn: &Connection, context: &str) -> KnowgraphResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT id FROM sessions WHERE context = ?1 AND ended_at IS NULL LIMIT 1;",
            params![context],
            |row| row.get(0),
        )
        .optional()?)
}

fn session_files(conn: &Connection, session_id: &str, activity: &str) -> KnowgraphResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT file_path FROM session_activity \
         WHERE session_id = ?1 AND activity = ?2 ORDER BY id;",
    )?;
    let files = stmt
        .query_map(params![session_id, activity], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(files)
}

fn load_session(conn: &Connection, session_id: &str) -> KnowgraphResult<Option<Session>> {
    let head = conn
        .query_row(
            "SELECT id, context, started_at, ended_at, summary FROM sessions WHERE id = ?1;",
            params![session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    time_column(row, 2)?,
                    optional_time_column(row, 3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((id, context, started_at, ended_at, summary)) = head else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare("SELECT question FROM session_questions WHERE session_id = ?1 ORDER BY id;")?;
    let questions = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(Some(Session {
        discussed_files: session_files(conn, &id, FileEvent::Discussion.activity())?,
        edited_files: session_files(conn, &id, FileEvent::Edit.activity())?,
        questions,
        id,
        context,
        started_at,
        ended_at,
        summary,
    }))
}

impl Database {
    // -----------------------------------------------------------------------
    // File events
    // -----------------------------------------------------------------------

    /// Bump one counter of `(context, file_path)` and attribute the event to a
    /// session. With no explicit `session_id` the context's active session,
    /// if any, is used. A first edit within a session pairs the file with
    /// every file already edited in it.
    pub fn record_file_event(
        &self,
        context: &str,
        file_path: &str,
        event: FileEvent,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> KnowgraphResult<()> {
        if file_path.trim().is_empty() {
            return Err(KnowgraphError::InvalidInput("file path is empty".to_string()));
        }
        let stamp = to_db_time(&now);
        self.write(|tx| {
            let session = match session_id {
                Some(id) => {
                    require_active_session(tx, id, Some(context))?;
                    Some(id.to_string())
                }
                None => active_session_id(tx, context)?,
            };

            let column = event.counter_column();
            tx.execute(
                &format!(
                    "INSERT INTO file_importance (context, file_path, {column}, last_accessed_at) \
                     VALUES (?1, ?2, 1, ?3) \
                     ON CONFLICT(context, file_path) DO UPDATE SET \
                         {column} = {column} + 1, \
                         last_accessed_at = excluded.last_accessed_at;"
                ),
                params![context, file_path, stamp],
            )?;

            let Some(session) = session else {
                return Ok(());
            };
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO session_activity (session_id, activity, file_path, recorded_at) \
                 VALUES (?1, ?2, ?3, ?4);",
                params![session, event.activity(), file_path, stamp],
            )?;
            if event != FileEvent::Edit || inserted == 0 {
                return Ok(());
            }

            let partners: Vec<String> = session_files(tx, &session, FileEvent::Edit.activity())?
                .into_iter()
                .filter(|other| other != file_path)
                .collect();
            let mut upsert = tx.prepare(
                "INSERT INTO co_edits (context, file_a, file_b, co_edit_count, last_co_edited_at) \
                 VALUES (?1, ?2, ?3, 1, ?4) \
                 ON CONFLICT(context, file_a, file_b) DO UPDATE SET \
                     co_edit_count = co_edit_count + 1, \
                     last_co_edited_at = excluded.last_co_edited_at;",
            )?;
            for other in &partners {
                let (a, b) = if other.as_str() < file_path {
                    (other.as_str(), file_path)
                } else {
                    (file_path, other.as_str())
                };
                upsert.execute(params![context, a, b, stamp])?;
            }
            Ok(())
        })
    }

    pub fn importance_rows(&self, context: &str) -> KnowgraphResult<Vec<FileImportance>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT file_path, context, access_count, edit_count, discussion_count, \
                        last_accessed_at, importance_score, recalculated_at \
                 FROM file_importance WHERE context = ?1 ORDER BY file_path;",
            )?;
            let rows = stmt
                .query_map(params![context], |row| {
                    Ok(FileImportance {
                        file_path: row.get(0)?,
                        context: row.get(1)?,
                        access_count: row.get(2)?,
                        edit_count: row.get(3)?,
                        discussion_count: row.get(4)?,
                        last_accessed_at: optional_time_column(row, 5)?,
                        importance_score: row.get(6)?,
                        recalculated_at: optional_time_column(row, 7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Persist recalculated scores in one transaction.
    pub fn update_importance_scores(
        &self,
        context: &str,
        scores: &[(String, f64)],
        now: DateTime<Utc>,
    ) -> KnowgraphResult<usize> {
        let stamp = to_db_time(&now);
        self.write(|tx| {
            let mut stmt = tx.prepare(
                "UPDATE file_importance SET importance_score = ?3, recalculated_at = ?4 \
                 WHERE context = ?1 AND file_path = ?2;",
            )?;
            let mut updated = 0;
            for (file_path, score) in scores {
                updated += stmt.execute(params![context, file_path, score, stamp])?;
            }
            Ok(updated)
        })
    }

    pub fn co_edit_counts(&self, context: &str) -> KnowgraphResult<CoEditCounts> {
        self.read_snapshot(|tx| {
            let mut stmt = tx.prepare(
                "SELECT file_a, file_b, context, co_edit_count, last_co_edited_at \
                 FROM co_edits WHERE context = ?1 ORDER BY file_a, file_b;",
            )?;
            let edges = stmt
                .query_map(params![context], |row| {
                    Ok(CoEditEdge {
                        file_a: row.get(0)?,
                        file_b: row.get(1)?,
                        context: row.get(2)?,
                        co_edit_count: row.get(3)?,
                        strength: 0.0,
                        last_co_edited_at: optional_time_column(row, 4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = tx.prepare(
                "SELECT file_path, edit_count FROM file_importance WHERE context = ?1;",
            )?;
            let mut edit_counts = HashMap::new();
            for row in stmt.query_map(params![context], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })? {
                let (path, count) = row?;
                edit_counts.insert(path, count);
            }
            Ok(CoEditCounts { edges, edit_counts })
        })
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Open a new session. Fails with `InvalidSessionState` when the context
    /// already has an active one.
    pub fn start_session(&self, context: &str, now: DateTime<Utc>) -> KnowgraphResult<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        self.write(|tx| {
            let inserted = tx.execute(
                "INSERT INTO sessions (id, context, started_at) VALUES (?1, ?2, ?3);",
                params![id, context, to_db_time(&now)],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(session_error(format!(
                        "context {context} already has an active session"
                    )));
                }
                Err(err) => return Err(err.into()),
            }
            load_session(tx, &id)?
                .ok_or_else(|| session_error(format!("session {id} vanished after insert")))
        })
    }

    pub fn end_session(
        &self,
        session_id: &str,
        summary: Option<&str>,
        now: DateTime<Utc>,
    ) -> KnowgraphResult<Session> {
        self.write(|tx| {
            require_active_session(tx, session_id, None)?;
            tx.execute(
                "UPDATE sessions SET ended_at = ?2, summary = COALESCE(?3, summary) WHERE id = ?1;",
                params![session_id, to_db_time(&now), summary],
            )?;
            load_session(tx, session_id)?
                .ok_or_else(|| session_error(format!("unknown session {session_id}")))
        })
    }

    pub fn active_session(&self, context: &str) -> KnowgraphResult<Option<Session>> {
        self.read_snapshot(|tx| match active_session_id(tx, context)? {
            Some(id) => load_session(tx, &id),
            None => Ok(None),
        })
    }

    pub fn get_session(&self, session_id: &str) -> KnowgraphResult<Option<Session>> {
        self.read_snapshot(|tx| load_session(tx, session_id))
    }

    /// Append a question to an active session.
    pub fn record_session_question(
        &self,
        session_id: &str,
        question: &str,
        now: DateTime<Utc>,
    ) -> KnowgraphResult<()> {
        self.write(|tx| {
            require_active_session(tx, session_id, None)?;
            tx.execute(
                "INSERT INTO session_questions (session_id, question, asked_at) VALUES (?1, ?2, ?3);",
                params![session_id, question, to_db_time(&now)],
            )?;
            Ok(())
        })
    }
}
