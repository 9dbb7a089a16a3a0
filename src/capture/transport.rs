use crate::config::RetryConfig;
use crate::event::{EventBatch, IngestReceipt};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector returned error status {status}: {message}")]
    Collector { status: u16, message: String },

    #[error("max delivery attempts exceeded")]
    MaxAttemptsExceeded,
}

/// Delivery seam between the capture buffer and the collector. Tests
/// substitute a recording or failing implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &EventBatch) -> Result<IngestReceipt, TransportError>;
}

/// POSTs batches to the collector's ingestion endpoint.
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &EventBatch) -> Result<IngestReceipt, TransportError> {
        let url = format!("{}/api/events", self.base_url);
        let response = self.client.post(&url).json(batch).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Collector {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let receipt = response.json().await?;
        Ok(receipt)
    }
}

/// Deliver one batch with bounded exponential backoff.
///
/// Retries re-send the same batch contents; the caller drops the batch when
/// this returns `MaxAttemptsExceeded`. At-least-once as a result: an
/// ambiguous failure after the collector stored the events leads to a
/// duplicate on retry, which replay tolerates.
pub async fn deliver_with_retry(
    transport: &dyn Transport,
    batch: &EventBatch,
    retry: &RetryConfig,
) -> Result<IngestReceipt, TransportError> {
    let mut backoff = retry.initial_backoff;
    let mut attempts = 0;

    loop {
        match transport.send(batch).await {
            Ok(receipt) => return Ok(receipt),
            Err(e) => {
                attempts += 1;
                if attempts >= retry.max_attempts {
                    tracing::error!(
                        session_id = %batch.session_id,
                        attempts = attempts,
                        error = %e,
                        "Max delivery attempts exceeded"
                    );
                    return Err(TransportError::MaxAttemptsExceeded);
                }

                tracing::warn!(
                    session_id = %batch.session_id,
                    attempt = attempts,
                    backoff_ms = backoff.as_millis(),
                    error = %e,
                    "Batch delivery failed, retrying"
                );

                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, Duration::from_secs(60));
            }
        }
    }
}
