//! Single entry point for a tool-dispatch layer.
//!
//! The engine wires configuration, the SQLite store, the source-fact
//! provider and the similarity function together. Every operation reads the
//! clock itself; the `analytics` functions take `now` explicitly for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::analytics::{
    coedit, importance, lessons, model_ranking, qa, sessions, JaccardSimilarity, LessonQuery,
    LessonReport, ModelQuery, ModelRecommendation, QaMatch, StoredQa, TextSimilarity,
};
use crate::config::{EngineConfig, CO_EDIT_CLUSTER_THRESHOLD};
use crate::errors::KnowgraphResult;
use crate::indexer::{self, CSharpFactProvider, IndexOptions, IndexStats, SourceFactProvider};
use crate::models::{
    CodeElement, CoEditedFile, FileGraph, FileImportance, ModelPerformanceRecord, Session,
    TaskFailureLesson,
};
use crate::query::{self, DependencyChain, GraphSnapshot, ImpactReport};
use crate::store::{CancelToken, Database, FileEvent, GraphStore};

/// Knowledge-graph engine over one SQLite store.
#[derive(Clone)]
pub struct KnowledgeEngine {
    db: Database,
    config: Arc<RwLock<EngineConfig>>,
    similarity: Arc<dyn TextSimilarity>,
    provider: Arc<dyn SourceFactProvider>,
}

impl KnowledgeEngine {
    /// Open (and migrate) the store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>, config: EngineConfig) -> KnowgraphResult<Self> {
        Ok(Self::new(Database::open(db_path)?, config))
    }

    /// Engine over an already-initialised store, with the C# provider and
    /// Jaccard similarity.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self {
            db,
            config: Arc::new(RwLock::new(config)),
            similarity: Arc::new(JaccardSimilarity),
            provider: Arc::new(CSharpFactProvider::new()),
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn TextSimilarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn SourceFactProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// A handle sharing config and store whose operations observe `token`.
    pub fn with_cancellation(&self, token: CancelToken) -> Self {
        Self {
            db: self.db.with_cancellation(token),
            ..self.clone()
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Replace the related-language table used by model ranking.
    pub fn set_related_languages(&self, table: BTreeMap<String, BTreeSet<String>>) {
        self.config.write().models.related_languages = table;
    }

    // ---- 1. Extraction and storage ---------------------------------------

    pub fn extract_graph(&self, source: &str, file_path: &str, context: &str) -> FileGraph {
        indexer::extract_graph(self.provider.as_ref(), source, file_path, context)
    }

    pub fn replace_file_graph(&self, graph: &FileGraph) -> KnowgraphResult<()> {
        self.db.replace_file_graph(graph)
    }

    pub fn delete_file_graph(&self, file_path: &str, context: &str) -> KnowgraphResult<()> {
        self.db.delete_file_graph(file_path, context)
    }

    pub fn find_element(&self, name: &str, context: Option<&str>) -> KnowgraphResult<Option<CodeElement>> {
        self.db.find_element(name, context)
    }

    /// Index `root` with the configured worker count and exclusions.
    pub fn index_directory(&self, root: &Path, context: &str) -> KnowgraphResult<IndexStats> {
        let options = IndexOptions::from(&self.config.read().indexing);
        self.index_directory_with(root, context, &options)
    }

    pub fn index_directory_with(
        &self,
        root: &Path,
        context: &str,
        options: &IndexOptions,
    ) -> KnowgraphResult<IndexStats> {
        indexer::index_directory(&self.db, self.provider.as_ref(), root, context, options)
    }

    // ---- 2. Graph algorithms ---------------------------------------------

    pub fn impact_analysis(&self, name: &str, context: Option<&str>) -> KnowgraphResult<Option<ImpactReport>> {
        let snapshot = GraphSnapshot::load(&self.db, context)?;
        Ok(query::impact_analysis(&snapshot, name))
    }

    pub fn dependency_chain(
        &self,
        name: &str,
        max_depth: i64,
        context: Option<&str>,
    ) -> KnowgraphResult<Option<DependencyChain>> {
        let snapshot = GraphSnapshot::load(&self.db, context)?;
        Ok(query::dependency_chain(&snapshot, name, max_depth))
    }

    pub fn find_cycles(&self, context: Option<&str>) -> KnowgraphResult<Vec<Vec<String>>> {
        let snapshot = GraphSnapshot::load(&self.db, context)?;
        Ok(query::find_cycles(&snapshot))
    }

    // ---- 3. Activity and sessions ----------------------------------------

    pub fn record_file_access(&self, context: &str, file_path: &str, session_id: Option<&str>) -> KnowgraphResult<()> {
        sessions::record_activity(&self.db, context, file_path, FileEvent::Access, session_id, Utc::now())
    }

    pub fn record_file_edit(&self, context: &str, file_path: &str, session_id: Option<&str>) -> KnowgraphResult<()> {
        sessions::record_activity(&self.db, context, file_path, FileEvent::Edit, session_id, Utc::now())
    }

    pub fn record_file_discussed(&self, context: &str, file_path: &str, session_id: Option<&str>) -> KnowgraphResult<()> {
        sessions::record_activity(&self.db, context, file_path, FileEvent::Discussion, session_id, Utc::now())
    }

    pub fn start_session(&self, context: &str) -> KnowgraphResult<Session> {
        sessions::start_session(&self.db, context, Utc::now())
    }

    pub fn end_session(&self, session_id: &str, summary: Option<&str>) -> KnowgraphResult<Session> {
        sessions::end_session(&self.db, session_id, summary, Utc::now())
    }

    pub fn active_session(&self, context: &str) -> KnowgraphResult<Option<Session>> {
        self.db.active_session(context)
    }

    pub fn record_session_question(&self, session_id: &str, question: &str) -> KnowgraphResult<()> {
        sessions::record_question(&self.db, session_id, question, Utc::now())
    }

    // ---- 4. Importance and co-edits --------------------------------------

    pub fn recalculate_importance(&self, context: &str) -> KnowgraphResult<Vec<FileImportance>> {
        let config = self.config.read().importance.clone();
        importance::recalculate_importance(&self.db, context, &config, Utc::now())
    }

    pub fn get_most_important_files(&self, context: &str, limit: i64) -> KnowgraphResult<Vec<FileImportance>> {
        importance::most_important_files(&self.db, context, limit)
    }

    pub fn get_co_edited_files(&self, context: &str, file_path: &str, limit: i64) -> KnowgraphResult<Vec<CoEditedFile>> {
        coedit::co_edited_files(&self.db, context, file_path, limit)
    }

    pub fn get_file_clusters(&self, context: &str) -> KnowgraphResult<Vec<Vec<String>>> {
        coedit::file_clusters(&self.db, context, CO_EDIT_CLUSTER_THRESHOLD)
    }

    // ---- 5. Q&A ----------------------------------------------------------

    pub fn store_qa(
        &self,
        context: &str,
        question: &str,
        answer: &str,
        relevant_files: &[String],
    ) -> KnowgraphResult<StoredQa> {
        let config = self.config.read().qa.clone();
        qa::store_qa(
            &self.db,
            self.similarity.as_ref(),
            &config,
            context,
            question,
            answer,
            relevant_files,
            Utc::now(),
        )
    }

    pub fn find_similar_questions(&self, question: &str, context: &str, limit: i64) -> KnowgraphResult<Vec<QaMatch>> {
        let config = self.config.read().qa.clone();
        qa::find_similar_questions(&self.db, self.similarity.as_ref(), &config, question, context, limit)
    }

    // ---- 6. Model performance and lessons --------------------------------

    pub fn record_model_performance(&self, record: &ModelPerformanceRecord) -> KnowgraphResult<()> {
        model_ranking::record_model_performance(&self.db, record)
    }

    pub fn query_best_model(&self, query: &ModelQuery) -> KnowgraphResult<ModelRecommendation> {
        let config = self.config.read().models.clone();
        model_ranking::query_best_model(&self.db, query, &config, Utc::now())
    }

    pub fn store_task_failure(&self, lesson: &TaskFailureLesson) -> KnowgraphResult<()> {
        lessons::store_task_failure(&self.db, lesson)
    }

    pub fn query_task_lessons(&self, query: &LessonQuery) -> KnowgraphResult<LessonReport> {
        lessons::query_task_lessons(&self.db, query, Utc::now())
    }
}
