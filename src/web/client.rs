use super::api::SessionDetail;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("collector returned error status {status}: {message}")]
    Collector { status: u16, message: String },
}

/// Fetch client for finalized sessions, used by the replay player.
#[derive(Debug)]
pub struct SessionClient {
    base_url: String,
    client: reqwest::Client,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Fetch a session's metadata plus its full ordered event list.
    pub async fn fetch_session(&self, session_id: &str) -> Result<SessionDetail, ClientError> {
        let url = format!("{}/api/sessions/{}", self.base_url, session_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(session_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(ClientError::Collector {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let detail = response.json().await?;
        Ok(detail)
    }
}
