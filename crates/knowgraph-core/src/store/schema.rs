//! SQLite schema DDL and migration framework.

use rusqlite::Connection;

use crate::errors::KnowgraphResult;

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 3;

/// Bookkeeping tables the migration framework itself needs. Created before
/// any step runs.
pub const BOOTSTRAP_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
];

/// Version 1 baseline DDL, applied by the first migration step.
///
/// Later columns and indexes are added by their own steps so that a
/// database stamped at any earlier version upgrades to the same shape as a
/// fresh one.
pub const BASELINE_STATEMENTS: &[&str] = &[
    // ── tables ──────────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS files (
        context TEXT NOT NULL,
        path TEXT NOT NULL,
        language TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        size_bytes INTEGER,
        last_indexed_at TEXT NOT NULL,
        PRIMARY KEY(context, path)
    );",
    "CREATE TABLE IF NOT EXISTS code_elements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        context TEXT NOT NULL,
        file_path TEXT NOT NULL,
        qualified_name TEXT NOT NULL,
        short_name TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        parent TEXT,
        metadata_json TEXT NOT NULL,
        metadata_version INTEGER NOT NULL,
        UNIQUE(context, file_path, qualified_name)
    );",
    "CREATE TABLE IF NOT EXISTS relationships (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        context TEXT NOT NULL,
        file_path TEXT NOT NULL,
        from_name TEXT NOT NULL,
        to_name TEXT NOT NULL,
        kind TEXT NOT NULL,
        line_number INTEGER NOT NULL,
        caller_object TEXT,
        inferred_type TEXT,
        expression TEXT
    );",
    "CREATE TABLE IF NOT EXISTS file_importance (
        context TEXT NOT NULL,
        file_path TEXT NOT NULL,
        access_count INTEGER NOT NULL DEFAULT 0,
        edit_count INTEGER NOT NULL DEFAULT 0,
        discussion_count INTEGER NOT NULL DEFAULT 0,
        last_accessed_at TEXT,
        importance_score REAL NOT NULL DEFAULT 0.0,
        recalculated_at TEXT,
        PRIMARY KEY(context, file_path)
    );",
    "CREATE TABLE IF NOT EXISTS co_edits (
        context TEXT NOT NULL,
        file_a TEXT NOT NULL,
        file_b TEXT NOT NULL,
        co_edit_count INTEGER NOT NULL DEFAULT 0,
        last_co_edited_at TEXT,
        PRIMARY KEY(context, file_a, file_b),
        CHECK(file_a < file_b)
    );",
    "CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        context TEXT NOT NULL,
        started_at TEXT NOT NULL,
        ended_at TEXT,
        summary TEXT
    );",
    "CREATE TABLE IF NOT EXISTS session_activity (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id),
        activity TEXT NOT NULL,
        file_path TEXT NOT NULL,
        recorded_at TEXT NOT NULL,
        UNIQUE(session_id, activity, file_path)
    );",
    "CREATE TABLE IF NOT EXISTS session_questions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id),
        question TEXT NOT NULL,
        asked_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS qa_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        context TEXT NOT NULL,
        question TEXT NOT NULL,
        answer TEXT NOT NULL,
        relevant_files_json TEXT NOT NULL DEFAULT '[]',
        times_asked INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        last_asked_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS model_performance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        model TEXT NOT NULL,
        task_type TEXT NOT NULL,
        language TEXT,
        complexity TEXT NOT NULL,
        outcome TEXT NOT NULL,
        score REAL NOT NULL,
        duration_ms INTEGER NOT NULL,
        iterations INTEGER NOT NULL,
        error_type TEXT,
        context TEXT,
        keywords_json TEXT NOT NULL DEFAULT '[]',
        recorded_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS task_failures (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_description TEXT NOT NULL,
        keywords_json TEXT NOT NULL DEFAULT '[]',
        language TEXT,
        failure_phase TEXT NOT NULL,
        error_pattern TEXT NOT NULL,
        error_message TEXT NOT NULL,
        approaches_tried_json TEXT NOT NULL DEFAULT '[]',
        models_used_json TEXT NOT NULL DEFAULT '[]',
        lesson TEXT NOT NULL,
        context TEXT,
        recorded_at TEXT NOT NULL
    );",
    // ── indexes ─────────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_elements_qualified ON code_elements(qualified_name, context);",
    "CREATE INDEX IF NOT EXISTS idx_elements_short ON code_elements(short_name, context);",
    "CREATE INDEX IF NOT EXISTS idx_elements_file ON code_elements(context, file_path);",
    "CREATE INDEX IF NOT EXISTS idx_rel_from ON relationships(from_name, kind);",
    "CREATE INDEX IF NOT EXISTS idx_rel_to ON relationships(to_name, kind);",
    "CREATE INDEX IF NOT EXISTS idx_rel_file ON relationships(context, file_path);",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active ON sessions(context) WHERE ended_at IS NULL;",
    "CREATE INDEX IF NOT EXISTS idx_activity_session ON session_activity(session_id, activity, id);",
    "CREATE INDEX IF NOT EXISTS idx_qa_context ON qa_entries(context);",
    "CREATE INDEX IF NOT EXISTS idx_model_perf_task ON model_performance(task_type, recorded_at);",
    "CREATE INDEX IF NOT EXISTS idx_failures_recorded ON task_failures(recorded_at);",
];

// ─── Migration framework ────────────────────────────────────────────────────

/// Run all pending migrations from the current stored version up to
/// [`SCHEMA_VERSION`]. Each step is wrapped in a SAVEPOINT so a failure
/// rolls back only that single step.
pub fn migrate_schema(conn: &Connection) -> KnowgraphResult<()> {
    for stmt in BOOTSTRAP_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    let mut current_version = get_schema_version(conn);

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT knowgraph_migrate_step;")?;

        let step_result = (|| -> KnowgraphResult<()> {
            match next_version {
                1 => migrate_to_v1(conn)?,
                2 => migrate_to_v2(conn)?,
                3 => migrate_to_v3(conn)?,
                _ => {}
            }
            set_schema_version(conn, next_version)?;
            record_migration_step(conn, current_version, next_version, "success", None)?;
            conn.execute_batch("RELEASE SAVEPOINT knowgraph_migrate_step;")?;
            Ok(())
        })();

        match step_result {
            Ok(()) => {
                current_version = next_version;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT knowgraph_migrate_step;");
                let _ = conn.execute_batch("RELEASE SAVEPOINT knowgraph_migrate_step;");
                let _ = record_migration_step(
                    conn,
                    current_version,
                    next_version,
                    "failed",
                    Some(&e.to_string()),
                );
                tracing::warn!(from = current_version, to = next_version, error = %e, "schema migration failed");
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Read the current schema version from `meta`.
/// Returns 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> KnowgraphResult<()> {
    conn.execute(
        "INSERT INTO meta(key, value) \
         VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from_v: i32,
    to_v: i32,
    status: &str,
    error_msg: Option<&str>,
) -> KnowgraphResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from_v, to_v, status, error_msg],
    )?;
    Ok(())
}

// ─── Individual migration steps ─────────────────────────────────────────────

/// v0 -> v1: baseline tables and indexes.
fn migrate_to_v1(conn: &Connection) -> KnowgraphResult<()> {
    for stmt in BASELINE_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    Ok(())
}

/// v1 -> v2: injection edges record the constructor parameter they came from.
fn migrate_to_v2(conn: &Connection) -> KnowgraphResult<()> {
    if !has_column(conn, "relationships", "parameter_name")? {
        conn.execute_batch("ALTER TABLE relationships ADD COLUMN parameter_name TEXT;")?;
    }
    Ok(())
}

/// v2 -> v3: index co-edit partners by either side of the pair.
fn migrate_to_v3(conn: &Connection) -> KnowgraphResult<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_co_edits_a ON co_edits(context, file_a);",
    )?;
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_co_edits_b ON co_edits(context, file_b);",
    )?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> KnowgraphResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}
