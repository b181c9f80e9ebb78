//! Session lifecycle and activity recording.

use chrono::{DateTime, Utc};

use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::models::Session;
use crate::query::guards::{truncate_text, MAX_QUESTION_LENGTH};
use crate::store::{Database, FileEvent};

fn require_context(context: &str) -> KnowgraphResult<()> {
    if context.trim().is_empty() {
        return Err(KnowgraphError::InvalidInput("context is empty".to_string()));
    }
    Ok(())
}

pub fn start_session(db: &Database, context: &str, now: DateTime<Utc>) -> KnowgraphResult<Session> {
    require_context(context)?;
    let session = db.start_session(context, now)?;
    tracing::info!(context, session = %session.id, "session started");
    Ok(session)
}

pub fn end_session(
    db: &Database,
    session_id: &str,
    summary: Option<&str>,
    now: DateTime<Utc>,
) -> KnowgraphResult<Session> {
    let session = db.end_session(session_id, summary, now)?;
    tracing::info!(
        context = %session.context,
        session = %session.id,
        edited = session.edited_files.len(),
        "session ended"
    );
    Ok(session)
}

/// Count a file event and attribute it to `session_id`, or to the context's
/// active session when none is given.
pub fn record_activity(
    db: &Database,
    context: &str,
    file_path: &str,
    event: FileEvent,
    session_id: Option<&str>,
    now: DateTime<Utc>,
) -> KnowgraphResult<()> {
    require_context(context)?;
    db.record_file_event(context, file_path, event, session_id, now)
}

pub fn record_question(
    db: &Database,
    session_id: &str,
    question: &str,
    now: DateTime<Utc>,
) -> KnowgraphResult<()> {
    let question = truncate_text(question, MAX_QUESTION_LENGTH);
    if question.is_empty() {
        return Err(KnowgraphError::InvalidInput("question is empty".to_string()));
    }
    db.record_session_question(session_id, &question, now)
}
