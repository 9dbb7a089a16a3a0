use crate::event::{EventBatch, IngestReceipt};
use crate::storage::{Storage, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Accepts event batches from the transport, associates each with its
/// session, and appends its events to storage.
///
/// Stateless per batch; two batches for the same session may be reconciled
/// concurrently and the timeline restores replay order by timestamp later.
pub struct Reconciler {
    storage: Arc<dyn Storage>,
}

impl Reconciler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Validate, upsert the session, append the events as one unit.
    ///
    /// Validation happens before any storage mutation. Re-submitted batches
    /// are not deduplicated: at-least-once delivery may store an event twice,
    /// and replay tolerates the redundant samples.
    pub async fn ingest(&self, batch: EventBatch) -> Result<IngestReceipt, IngestError> {
        validate_batch(&batch)?;

        self.storage
            .upsert_session(&batch.session_id, &batch.website_id)
            .await?;

        self.storage
            .append_events(&batch.session_id, &batch.events)
            .await?;

        debug!(
            session_id = %batch.session_id,
            website_id = %batch.website_id,
            events = batch.events.len(),
            "Ingested event batch"
        );

        Ok(IngestReceipt {
            status: "success".to_string(),
            session_id: batch.session_id,
            events_processed: batch.events.len(),
        })
    }
}

fn validate_batch(batch: &EventBatch) -> Result<(), IngestError> {
    if batch.session_id.trim().is_empty() {
        return Err(IngestError::InvalidPayload(
            "sessionId must be a non-empty string".to_string(),
        ));
    }
    if batch.website_id.trim().is_empty() {
        return Err(IngestError::InvalidPayload(
            "websiteId must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}
