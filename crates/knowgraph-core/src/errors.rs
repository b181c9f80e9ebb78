//! Error types for the knowgraph core library.

/// Top-level error enum for the knowgraph core library.
///
/// Only [`KnowgraphError::StoreUnavailable`] and
/// [`KnowgraphError::InvalidSessionState`] are meant to reach a caller as
/// hard failures. Parse failures and resolution misses never become errors;
/// they degrade to empty or partial results.
#[derive(Debug, thiserror::Error)]
pub enum KnowgraphError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KnowgraphError {
    /// True for the failure classes a caller must handle rather than ignore.
    pub fn is_hard_failure(&self) -> bool {
        matches!(
            self,
            KnowgraphError::StoreUnavailable(_) | KnowgraphError::InvalidSessionState(_)
        )
    }
}

pub type KnowgraphResult<T> = Result<T, KnowgraphError>;
