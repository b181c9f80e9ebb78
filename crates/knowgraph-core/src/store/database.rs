//! SQLite storage layer.
//!
//! Every public method opens its own connection, so callers never manage
//! connection lifetime and each read sees a committed snapshot.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::models::{
    CodeElement, EdgeRecord, ElementKind, ElementMetadata, FileGraph, FileRecord, Relationship,
    RelationshipKind, METADATA_VERSION,
};
use crate::store::cancel::CancelToken;
use crate::store::schema;
use crate::store::traits::{GraphData, GraphStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ELEMENT_COLUMNS: &str = "context, file_path, qualified_name, short_name, name, kind, \
     start_line, end_line, parent, metadata_json";

const EDGE_COLUMNS: &str = "context, file_path, from_name, to_name, kind, line_number, \
     caller_object, inferred_type, expression, parameter_name";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

/// RFC 3339 UTC with fixed nanosecond digits; round-trips exactly and sorts
/// lexicographically.
pub(crate) fn to_db_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_db_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Column decode failure for values SQLite stored but we cannot interpret.
pub(crate) fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

pub(crate) fn time_column(row: &Row<'_>, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

pub(crate) fn optional_time_column(
    row: &Row<'_>,
    column: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    Ok(raw.as_deref().and_then(parse_db_time))
}

pub(crate) fn json_list_column(row: &Row<'_>, column: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(column, e))
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {what}: {value}")]
pub(crate) struct UnknownValue {
    pub what: &'static str,
    pub value: String,
}

fn element_from_row(row: &Row<'_>) -> rusqlite::Result<CodeElement> {
    let kind_raw: String = row.get(5)?;
    let kind = ElementKind::parse(&kind_raw).ok_or_else(|| {
        conversion_error(
            5,
            UnknownValue {
                what: "element kind",
                value: kind_raw.clone(),
            },
        )
    })?;
    let metadata_raw: String = row.get(9)?;
    let metadata: ElementMetadata =
        serde_json::from_str(&metadata_raw).map_err(|e| conversion_error(9, e))?;
    Ok(CodeElement {
        context: row.get(0)?,
        file_path: row.get(1)?,
        qualified_name: row.get(2)?,
        short_name: row.get(3)?,
        name: row.get(4)?,
        kind,
        start_line: row.get(6)?,
        end_line: row.get(7)?,
        parent: row.get(8)?,
        metadata,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<EdgeRecord> {
    let kind_raw: String = row.get(4)?;
    let kind = RelationshipKind::parse(&kind_raw).ok_or_else(|| {
        conversion_error(
            4,
            UnknownValue {
                what: "relationship kind",
                value: kind_raw.clone(),
            },
        )
    })?;
    Ok(EdgeRecord {
        context: row.get(0)?,
        file_path: row.get(1)?,
        relationship: Relationship {
            from: row.get(2)?,
            to: row.get(3)?,
            kind,
            line_number: row.get(5)?,
            caller_object: row.get(6)?,
            inferred_type: row.get(7)?,
            expression: row.get(8)?,
            parameter_name: row.get(9)?,
        },
    })
}

fn kind_filter(kinds: &[RelationshipKind]) -> impl Fn(&EdgeRecord) -> bool + '_ {
    move |edge| kinds.is_empty() || kinds.contains(&edge.relationship.kind)
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// SQLite knowledge-graph store.
#[derive(Clone, Debug)]
pub struct Database {
    db_path: PathBuf,
    cancel: Option<CancelToken>,
}

impl Database {
    /// Resolve the path and create parent directories. Does not touch the
    /// schema; see [`Database::open`].
    pub fn new(db_path: impl AsRef<Path>) -> KnowgraphResult<Self> {
        let expanded = expand_tilde(&db_path.as_ref().to_string_lossy());
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                KnowgraphError::StoreUnavailable(format!("{}: {e}", parent.display()))
            })?;
        }
        Ok(Self {
            db_path: resolved,
            cancel: None,
        })
    }

    /// [`Database::new`] followed by [`Database::init_schema`].
    pub fn open(db_path: impl AsRef<Path>) -> KnowgraphResult<Self> {
        let db = Self::new(db_path)?;
        db.init_schema()?;
        Ok(db)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// A handle on the same database whose operations observe `token`.
    pub fn with_cancellation(&self, token: CancelToken) -> Self {
        Self {
            db_path: self.db_path.clone(),
            cancel: Some(token),
        }
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    fn check_cancelled(&self) -> KnowgraphResult<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    pub(crate) fn connect(&self) -> KnowgraphResult<Connection> {
        let conn = Connection::open(&self.db_path).map_err(|e| {
            KnowgraphError::StoreUnavailable(format!("{}: {e}", self.db_path.display()))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .and_then(|_| conn.execute_batch("PRAGMA foreign_keys = ON;"))
            .map_err(|e| KnowgraphError::StoreUnavailable(e.to_string()))?;
        Ok(conn)
    }

    /// Set WAL mode, create tables and indexes, then run pending migrations.
    pub fn init_schema(&self) -> KnowgraphResult<()> {
        let conn = self.connect()?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| KnowgraphError::StoreUnavailable(e.to_string()))?;
        schema::migrate_schema(&conn)?;
        Ok(())
    }

    pub fn schema_version(&self) -> KnowgraphResult<i32> {
        let conn = self.connect()?;
        Ok(schema::get_schema_version(&conn))
    }

    /// Run `op` on a fresh connection.
    pub(crate) fn read<T>(
        &self,
        op: impl FnOnce(&Connection) -> KnowgraphResult<T>,
    ) -> KnowgraphResult<T> {
        self.check_cancelled()?;
        let conn = self.connect()?;
        op(&conn)
    }

    /// Run `op` inside one deferred read transaction, so every statement
    /// sees the same snapshot.
    pub(crate) fn read_snapshot<T>(
        &self,
        op: impl FnOnce(&Transaction<'_>) -> KnowgraphResult<T>,
    ) -> KnowgraphResult<T> {
        self.check_cancelled()?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `op` inside one `IMMEDIATE` transaction. Cancellation observed
    /// before commit rolls everything back.
    pub(crate) fn write<T>(
        &self,
        op: impl FnOnce(&Transaction<'_>) -> KnowgraphResult<T>,
    ) -> KnowgraphResult<T> {
        self.check_cancelled()?;
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        if let Err(err) = self.check_cancelled() {
            tx.rollback()?;
            tracing::warn!("write cancelled before commit; rolled back");
            return Err(err);
        }
        tx.commit()?;
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Meta
    // -----------------------------------------------------------------------

    pub fn get_meta(&self, key: &str) -> KnowgraphResult<Option<String>> {
        self.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM meta WHERE key = ?1 LIMIT 1;",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn set_meta(&self, key: &str, value: &str) -> KnowgraphResult<()> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO meta(key, value) VALUES(?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
                params![key, value],
            )?;
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    pub fn upsert_file(&self, record: &FileRecord) -> KnowgraphResult<()> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO files (context, path, language, content_hash, size_bytes, last_indexed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(context, path) DO UPDATE SET \
                     language = excluded.language, \
                     content_hash = excluded.content_hash, \
                     size_bytes = excluded.size_bytes, \
                     last_indexed_at = excluded.last_indexed_at;",
                params![
                    record.context,
                    record.path,
                    record.language,
                    record.content_hash,
                    record.size_bytes,
                    to_db_time(&Utc::now()),
                ],
            )?;
            Ok(())
        })
    }

    /// Stored content hash per indexed path of `context`.
    pub fn file_hashes(&self, context: &str) -> KnowgraphResult<HashMap<String, String>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT path, content_hash FROM files WHERE context = ?1;")?;
            let rows = stmt.query_map(params![context], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut out = HashMap::new();
            for row in rows {
                let (path, hash) = row?;
                out.insert(path, hash);
            }
            Ok(out)
        })
    }

    pub fn count_elements(&self, context: Option<&str>) -> KnowgraphResult<i64> {
        self.read(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM code_elements WHERE (?1 IS NULL OR context = ?1);",
                params![context],
                |row| row.get(0),
            )?)
        })
    }

    pub fn count_relationships(&self, context: Option<&str>) -> KnowgraphResult<i64> {
        self.read(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM relationships WHERE (?1 IS NULL OR context = ?1);",
                params![context],
                |row| row.get(0),
            )?)
        })
    }

    // -----------------------------------------------------------------------
    // Graph internals
    // -----------------------------------------------------------------------

    fn delete_file_rows(tx: &Transaction<'_>, file_path: &str, context: &str) -> KnowgraphResult<()> {
        tx.execute(
            "DELETE FROM code_elements WHERE context = ?1 AND file_path = ?2;",
            params![context, file_path],
        )?;
        tx.execute(
            "DELETE FROM relationships WHERE context = ?1 AND file_path = ?2;",
            params![context, file_path],
        )?;
        Ok(())
    }

    fn edges_where(
        &self,
        column: &str,
        name: &str,
        kinds: &[RelationshipKind],
        context: Option<&str>,
    ) -> KnowgraphResult<Vec<EdgeRecord>> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM relationships \
             WHERE {column} = ?1 AND (?2 IS NULL OR context = ?2) ORDER BY id;"
        );
        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![name, context], edge_from_row)?;
            let keep = kind_filter(kinds);
            let mut out = Vec::new();
            for row in rows {
                let edge = row?;
                if keep(&edge) {
                    out.push(edge);
                }
            }
            Ok(out)
        })
    }
}

impl GraphStore for Database {
    fn replace_file_graph(&self, graph: &FileGraph) -> KnowgraphResult<()> {
        self.write(|tx| {
            Self::delete_file_rows(tx, &graph.file_path, &graph.context)?;

            let mut insert_element = tx.prepare(&format!(
                "INSERT OR IGNORE INTO code_elements ({ELEMENT_COLUMNS}, metadata_version) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);"
            ))?;
            for element in &graph.elements {
                insert_element.execute(params![
                    graph.context,
                    graph.file_path,
                    element.qualified_name,
                    element.short_name,
                    element.name,
                    element.kind.as_str(),
                    element.start_line,
                    element.end_line,
                    element.parent,
                    serde_json::to_string(&element.metadata)?,
                    METADATA_VERSION,
                ])?;
            }

            let mut insert_edge = tx.prepare(&format!(
                "INSERT INTO relationships ({EDGE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);"
            ))?;
            let mut seen: HashSet<&Relationship> = HashSet::new();
            for rel in &graph.relationships {
                if !seen.insert(rel) {
                    continue;
                }
                insert_edge.execute(params![
                    graph.context,
                    graph.file_path,
                    rel.from,
                    rel.to,
                    rel.kind.as_str(),
                    rel.line_number,
                    rel.caller_object,
                    rel.inferred_type,
                    rel.expression,
                    rel.parameter_name,
                ])?;
            }
            Ok(())
        })
    }

    fn delete_file_graph(&self, file_path: &str, context: &str) -> KnowgraphResult<()> {
        self.write(|tx| {
            Self::delete_file_rows(tx, file_path, context)?;
            tx.execute(
                "DELETE FROM files WHERE context = ?1 AND path = ?2;",
                params![context, file_path],
            )?;
            Ok(())
        })
    }

    fn outgoing_edges(
        &self,
        name: &str,
        kinds: &[RelationshipKind],
        context: Option<&str>,
    ) -> KnowgraphResult<Vec<EdgeRecord>> {
        self.edges_where("from_name", name, kinds, context)
    }

    fn incoming_edges(
        &self,
        name: &str,
        kinds: &[RelationshipKind],
        context: Option<&str>,
    ) -> KnowgraphResult<Vec<EdgeRecord>> {
        self.edges_where("to_name", name, kinds, context)
    }

    fn load_graph(&self, context: Option<&str>) -> KnowgraphResult<GraphData> {
        self.read_snapshot(|tx| {
            let mut stmt = tx.prepare(&format!(
                "SELECT {ELEMENT_COLUMNS} FROM code_elements \
                 WHERE (?1 IS NULL OR context = ?1) ORDER BY id;"
            ))?;
            let elements = stmt
                .query_map(params![context], element_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = tx.prepare(&format!(
                "SELECT {EDGE_COLUMNS} FROM relationships \
                 WHERE (?1 IS NULL OR context = ?1) ORDER BY id;"
            ))?;
            let edges = stmt
                .query_map(params![context], edge_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(GraphData { elements, edges })
        })
    }

    fn find_element(
        &self,
        name: &str,
        context: Option<&str>,
    ) -> KnowgraphResult<Option<CodeElement>> {
        self.read(|conn| {
            let exact = conn
                .query_row(
                    &format!(
                        "SELECT {ELEMENT_COLUMNS} FROM code_elements \
                         WHERE qualified_name = ?1 AND (?2 IS NULL OR context = ?2) \
                         ORDER BY id LIMIT 1;"
                    ),
                    params![name, context],
                    element_from_row,
                )
                .optional()?;
            if exact.is_some() {
                return Ok(exact);
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {ELEMENT_COLUMNS} FROM code_elements \
                 WHERE short_name = ?1 AND (?2 IS NULL OR context = ?2) ORDER BY id;"
            ))?;
            let candidates = stmt
                .query_map(params![name, context], element_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            let distinct: HashSet<&str> = candidates
                .iter()
                .map(|e| e.qualified_name.as_str())
                .collect();
            if distinct.len() == 1 {
                Ok(candidates.into_iter().next())
            } else {
                Ok(None)
            }
        })
    }
}
