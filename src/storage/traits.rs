use crate::event::{EventRow, InteractionEvent, Session};
use async_trait::async_trait;

/// Storage backend for sessions and their events.
///
/// Injected as `Arc<dyn Storage>` into the reconciler, the timeline loader,
/// and the web state; there is no process-global handle.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Create the session if it does not exist. A no-op when the id is
    /// already present; the first writer's `website_id` wins.
    async fn upsert_session(&self, id: &str, website_id: &str) -> Result<(), StorageError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError>;

    /// Append a batch's events as a single logical unit. On failure no rows
    /// from the batch remain.
    async fn append_events(
        &self,
        session_id: &str,
        events: &[InteractionEvent],
    ) -> Result<(), StorageError>;

    /// All persisted events for a session, in arrival order.
    async fn session_event_rows(&self, session_id: &str) -> Result<Vec<EventRow>, StorageError>;

    /// Sessions newest-first with per-session event counts.
    async fn list_sessions(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SessionSummary>, StorageError>;

    async fn count_sessions(&self) -> Result<usize, StorageError>;
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: Session,
    pub event_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("stored payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
