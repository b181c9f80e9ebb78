//! Shared typed models used across extraction, storage, algorithms and analytics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Schema / contract constants
// ---------------------------------------------------------------------------

/// Version of the persisted [`ElementMetadata`] layout.
pub const METADATA_VERSION: i64 = 1;

/// Language identifier stored for C# files.
pub const LANGUAGE_CSHARP: &str = "csharp";

// ---------------------------------------------------------------------------
// 1. ElementKind / TypeKind
// ---------------------------------------------------------------------------

/// Kind of a declared program entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Type,
    Method,
    Field,
    Property,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Type => "type",
            ElementKind::Method => "method",
            ElementKind::Field => "field",
            ElementKind::Property => "property",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "type" => Some(ElementKind::Type),
            "method" => Some(ElementKind::Method),
            "field" => Some(ElementKind::Field),
            "property" => Some(ElementKind::Property),
            _ => None,
        }
    }
}

/// Flavour of a type declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Record,
    Enum,
}

// ---------------------------------------------------------------------------
// 2. ElementMetadata
// ---------------------------------------------------------------------------

/// Metrics recorded for methods and constructors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodMetrics {
    pub cyclomatic_complexity: u32,
    pub cognitive_complexity: u32,
    pub lines_of_code: u32,
    pub is_async: bool,
    pub is_static: bool,
    pub parameter_count: u32,
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Facts recorded for type declarations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeMetadata {
    pub type_kind: TypeKind,
    pub base_types: Vec<String>,
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_partial: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Facts recorded for fields and properties.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberMetadata {
    pub declared_type: Option<String>,
    pub is_readonly: bool,
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Per-element metadata as a tagged union of the known metric shapes.
///
/// Classifier layers attach free-form tags through [`ElementMetadata::extra_mut`];
/// the known metrics stay typed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ElementMetadata {
    Type(TypeMetadata),
    Method(MethodMetrics),
    Member(MemberMetadata),
}

impl ElementMetadata {
    pub fn method_metrics(&self) -> Option<&MethodMetrics> {
        match self {
            ElementMetadata::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        match self {
            ElementMetadata::Type(t) => &t.extra,
            ElementMetadata::Method(m) => &m.extra,
            ElementMetadata::Member(m) => &m.extra,
        }
    }

    pub fn extra_mut(&mut self) -> &mut BTreeMap<String, String> {
        match self {
            ElementMetadata::Type(t) => &mut t.extra,
            ElementMetadata::Method(m) => &mut m.extra,
            ElementMetadata::Member(m) => &mut m.extra,
        }
    }
}

// ---------------------------------------------------------------------------
// 3. CodeElement
// ---------------------------------------------------------------------------

/// A declared program entity (type, method, field or property).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeElement {
    /// Namespace-qualified name, unique within a context.
    pub qualified_name: String,
    /// Qualified name without the namespace prefix (e.g. `Orders.Place`).
    pub short_name: String,
    pub name: String,
    pub kind: ElementKind,
    pub file_path: String,
    pub context: String,
    pub start_line: i64,
    pub end_line: i64,
    /// Qualified name of the declaring type, if any.
    pub parent: Option<String>,
    pub metadata: ElementMetadata,
}

// ---------------------------------------------------------------------------
// 4. Relationship
// ---------------------------------------------------------------------------

/// Kind of a directed relationship.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Calls,
    Injects,
    Inherits,
    Implements,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 4] = [
        RelationshipKind::Calls,
        RelationshipKind::Injects,
        RelationshipKind::Inherits,
        RelationshipKind::Implements,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Calls => "CALLS",
            RelationshipKind::Injects => "INJECTS",
            RelationshipKind::Inherits => "INHERITS",
            RelationshipKind::Implements => "IMPLEMENTS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CALLS" => Some(RelationshipKind::Calls),
            "INJECTS" => Some(RelationshipKind::Injects),
            "INHERITS" => Some(RelationshipKind::Inherits),
            "IMPLEMENTS" => Some(RelationshipKind::Implements),
            _ => None,
        }
    }
}

/// A directed edge between two elements, or an element and an unresolved name.
///
/// `to` is either a qualified name or the bare member name when resolution
/// failed. `inferred_type` and `caller_object` are omitted rather than guessed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub kind: RelationshipKind,
    pub line_number: i64,
    pub caller_object: Option<String>,
    pub inferred_type: Option<String>,
    pub expression: Option<String>,
    /// Constructor parameter name for `Injects` edges.
    pub parameter_name: Option<String>,
}

/// A relationship as persisted, with the file and context it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub relationship: Relationship,
    pub file_path: String,
    pub context: String,
}

// ---------------------------------------------------------------------------
// 5. FileGraph
// ---------------------------------------------------------------------------

/// Extraction output for one file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileGraph {
    pub file_path: String,
    pub context: String,
    pub language: String,
    pub elements: Vec<CodeElement>,
    pub relationships: Vec<Relationship>,
}

impl FileGraph {
    pub fn empty(file_path: &str, context: &str, language: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            context: context.to_string(),
            language: language.to_string(),
            elements: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.relationships.is_empty()
    }

    /// Relationships of one kind, in extraction order.
    pub fn relationships_of(&self, kind: RelationshipKind) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(move |r| r.kind == kind)
    }

    pub fn element(&self, qualified_name: &str) -> Option<&CodeElement> {
        self.elements
            .iter()
            .find(|e| e.qualified_name == qualified_name)
    }
}

/// Indexing bookkeeping for one source file in one context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub context: String,
    pub language: String,
    pub content_hash: String,
    pub size_bytes: i64,
}

// ---------------------------------------------------------------------------
// 6. FileImportance / co-edits
// ---------------------------------------------------------------------------

/// Activity counters and derived importance for one file in one context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileImportance {
    pub file_path: String,
    pub context: String,
    pub access_count: i64,
    pub edit_count: i64,
    pub discussion_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub importance_score: f64,
    pub recalculated_at: Option<DateTime<Utc>>,
}

/// An unordered co-edit pair. `file_a < file_b` always holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoEditEdge {
    pub file_a: String,
    pub file_b: String,
    pub context: String,
    pub co_edit_count: i64,
    pub strength: f64,
    pub last_co_edited_at: Option<DateTime<Utc>>,
}

/// One partner of a file in the co-edit graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoEditedFile {
    pub file_path: String,
    pub co_edit_count: i64,
    pub strength: f64,
}

// ---------------------------------------------------------------------------
// 7. Session
// ---------------------------------------------------------------------------

/// A tracked working session. At most one per context has `ended_at == None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub context: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub discussed_files: Vec<String>,
    pub edited_files: Vec<String>,
    pub questions: Vec<String>,
    pub summary: Option<String>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// 8. Q&A
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QaEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub relevant_files: Vec<String>,
    pub context: String,
    pub times_asked: i64,
    pub created_at: DateTime<Utc>,
    pub last_asked_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 9. Model performance
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Partial => "partial",
            Outcome::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Outcome::Success),
            "partial" => Some(Outcome::Partial),
            "failure" => Some(Outcome::Failure),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityBucket {
    Simple,
    Moderate,
    Complex,
}

impl ComplexityBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityBucket::Simple => "simple",
            ComplexityBucket::Moderate => "moderate",
            ComplexityBucket::Complex => "complex",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "simple" => Some(ComplexityBucket::Simple),
            "moderate" => Some(ComplexityBucket::Moderate),
            "complex" => Some(ComplexityBucket::Complex),
            _ => None,
        }
    }
}

/// Immutable, append-only record of one model run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformanceRecord {
    pub model: String,
    pub task_type: String,
    pub language: Option<String>,
    pub complexity: ComplexityBucket,
    pub outcome: Outcome,
    pub score: f64,
    pub duration_ms: i64,
    pub iterations: i64,
    pub error_type: Option<String>,
    pub context: Option<String>,
    pub keywords: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 10. Task failure lessons
// ---------------------------------------------------------------------------

/// Immutable, append-only record of a failed task and what was learned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskFailureLesson {
    pub task_description: String,
    pub keywords: Vec<String>,
    pub language: Option<String>,
    pub failure_phase: String,
    pub error_pattern: String,
    pub error_message: String,
    pub approaches_tried: Vec<String>,
    pub models_used: Vec<String>,
    pub lesson: String,
    pub context: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_kind_round_trips_through_str() {
        for kind in RelationshipKind::ALL {
            assert_eq!(RelationshipKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RelationshipKind::parse("EXTENDS"), None);
    }

    #[test]
    fn metadata_serializes_with_shape_tag() {
        let meta = ElementMetadata::Method(MethodMetrics {
            cyclomatic_complexity: 3,
            is_async: true,
            ..MethodMetrics::default()
        });
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["shape"], "method");
        assert_eq!(json["cyclomatic_complexity"], 3);
        let back: ElementMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn metadata_extra_tags_are_reachable_for_every_shape() {
        let mut meta = ElementMetadata::Member(MemberMetadata::default());
        meta.extra_mut()
            .insert("pattern".to_string(), "repository".to_string());
        assert_eq!(meta.extra().get("pattern").map(String::as_str), Some("repository"));
        assert!(meta.method_metrics().is_none());
    }

    #[test]
    fn empty_file_graph_reports_empty() {
        let graph = FileGraph::empty("a.cs", "ctx", LANGUAGE_CSHARP);
        assert!(graph.is_empty());
        assert_eq!(graph.language, "csharp");
    }
}
