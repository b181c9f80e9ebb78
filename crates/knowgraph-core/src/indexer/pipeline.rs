//! Indexing pipeline orchestration with Rayon-based parallelism.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::IndexingConfig;
use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::indexer::extractor::try_extract_graph;
use crate::indexer::facts::SourceFactProvider;
use crate::indexer::filesystem::{detect_language, hash_bytes, iter_source_files, relative_path};
use crate::models::{FileGraph, FileRecord};
use crate::store::{Database, GraphStore};

/// A source file found by the scan, with its content hash.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: String,
    pub absolute: PathBuf,
    pub language: &'static str,
    pub content_hash: String,
    pub size_bytes: i64,
}

impl SourceFile {
    fn record(&self, context: &str) -> FileRecord {
        FileRecord {
            path: self.path.clone(),
            context: context.to_string(),
            language: self.language.to_string(),
            content_hash: self.content_hash.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

#[derive(Debug)]
pub struct ExtractionResult {
    pub file: SourceFile,
    pub outcome: KnowgraphResult<FileGraph>,
}

fn read_source(path: &Path) -> KnowgraphResult<String> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn extract_file_worker(
    provider: &dyn SourceFactProvider,
    file: SourceFile,
    context: &str,
) -> ExtractionResult {
    let outcome = read_source(&file.absolute)
        .and_then(|source| try_extract_graph(provider, &source, &file.path, context));
    ExtractionResult { file, outcome }
}

pub fn parallel_extract(
    provider: &dyn SourceFactProvider,
    files: Vec<SourceFile>,
    context: &str,
    workers: usize,
) -> Vec<ExtractionResult> {
    if files.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| {
            files
                .into_par_iter()
                .map(|file| extract_file_worker(provider, file, context))
                .collect()
        }),
        Err(err) => {
            tracing::warn!(error = %err, "thread pool unavailable, extracting sequentially");
            files
                .into_iter()
                .map(|file| extract_file_worker(provider, file, context))
                .collect()
        }
    }
}

/// Scan `root` for source files and hash them. Returns the files that could
/// be read; unreadable ones are logged and skipped.
pub fn scan_source_files(root: &Path, excluded_dirs: &[String]) -> Vec<SourceFile> {
    let mut records = Vec::new();
    for absolute in iter_source_files(root, excluded_dirs) {
        let Some(language) = detect_language(&absolute) else {
            continue;
        };
        let bytes = match std::fs::read(&absolute) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(file = %absolute.display(), error = %err, "unreadable source file");
                continue;
            }
        };
        records.push(SourceFile {
            path: relative_path(root, &absolute),
            content_hash: hash_bytes(&bytes),
            size_bytes: bytes.len() as i64,
            language,
            absolute,
        });
    }
    records
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexOptions {
    pub workers: usize,
    pub excluded_dirs: Vec<String>,
    /// Re-extract files whose hash is unchanged.
    pub force: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::from(&IndexingConfig::default())
    }
}

impl From<&IndexingConfig> for IndexOptions {
    fn from(config: &IndexingConfig) -> Self {
        Self {
            workers: config.workers,
            excluded_dirs: config.excluded_dirs.clone(),
            force: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_removed: usize,
    pub parse_failures: usize,
    pub elements_indexed: usize,
    pub relationships_indexed: usize,
    pub elapsed_ms: u64,
}

/// Index every source file under `root` into `context`.
///
/// Unchanged files are skipped by content hash. A file that fails to parse
/// keeps its previously stored graph and is retried on the next run. Files
/// indexed before but no longer present are removed.
pub fn index_directory(
    db: &Database,
    provider: &dyn SourceFactProvider,
    root: &Path,
    context: &str,
    options: &IndexOptions,
) -> KnowgraphResult<IndexStats> {
    if !root.is_dir() {
        return Err(KnowgraphError::InvalidInput(format!(
            "not a directory: {}",
            root.display()
        )));
    }
    let started = Instant::now();
    let mut stats = IndexStats::default();

    let files = scan_source_files(root, &options.excluded_dirs);
    stats.files_seen = files.len();
    let stored = db.file_hashes(context)?;
    let present: HashSet<String> = files.iter().map(|f| f.path.clone()).collect();

    let (changed, unchanged): (Vec<SourceFile>, Vec<SourceFile>) = files
        .into_iter()
        .partition(|f| options.force || stored.get(&f.path) != Some(&f.content_hash));
    stats.files_skipped = unchanged.len();
    for file in &unchanged {
        tracing::debug!(file = %file.path, "unchanged, skipped");
    }

    for result in parallel_extract(provider, changed, context, options.workers) {
        match result.outcome {
            Ok(graph) => {
                db.replace_file_graph(&graph)?;
                db.upsert_file(&result.file.record(context))?;
                stats.files_indexed += 1;
                stats.elements_indexed += graph.elements.len();
                stats.relationships_indexed += graph.relationships.len();
            }
            Err(err) if err.is_hard_failure() => return Err(err),
            Err(err) => {
                tracing::debug!(file = %result.file.path, error = %err, "extraction failed");
                stats.parse_failures += 1;
            }
        }
    }

    let mut removed: Vec<&String> = stored.keys().filter(|p| !present.contains(*p)).collect();
    removed.sort();
    for path in removed {
        db.delete_file_graph(path, context)?;
        stats.files_removed += 1;
    }

    stats.elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        context,
        seen = stats.files_seen,
        indexed = stats.files_indexed,
        skipped = stats.files_skipped,
        removed = stats.files_removed,
        failures = stats.parse_failures,
        elapsed_ms = stats.elapsed_ms,
        "index run finished"
    );
    Ok(stats)
}
