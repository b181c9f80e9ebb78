//! Persistence boundary between extraction, algorithms and the backend.

use serde::Serialize;

use crate::errors::KnowgraphResult;
use crate::models::{CodeElement, EdgeRecord, FileGraph, RelationshipKind};

/// All elements and relationships of one context (or of every context),
/// read from a single consistent snapshot.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GraphData {
    pub elements: Vec<CodeElement>,
    pub edges: Vec<EdgeRecord>,
}

/// Graph persistence used by the extractor and the graph algorithms.
///
/// A `context` of `None` means "all contexts".
pub trait GraphStore: Send + Sync {
    /// Atomically replace everything attributed to `(graph.file_path, graph.context)`.
    fn replace_file_graph(&self, graph: &FileGraph) -> KnowgraphResult<()>;

    fn delete_file_graph(&self, file_path: &str, context: &str) -> KnowgraphResult<()>;

    fn outgoing_edges(
        &self,
        name: &str,
        kinds: &[RelationshipKind],
        context: Option<&str>,
    ) -> KnowgraphResult<Vec<EdgeRecord>>;

    fn incoming_edges(
        &self,
        name: &str,
        kinds: &[RelationshipKind],
        context: Option<&str>,
    ) -> KnowgraphResult<Vec<EdgeRecord>>;

    fn load_graph(&self, context: Option<&str>) -> KnowgraphResult<GraphData>;

    /// Exact qualified name first, then a unique short name.
    fn find_element(&self, name: &str, context: Option<&str>)
        -> KnowgraphResult<Option<CodeElement>>;
}
