use crate::event::{EventBatch, IngestReceipt, InteractionEvent, Session};
use crate::ingest::{IngestError, Reconciler};
use crate::storage::{Storage, StorageError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for the collector API
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub reconciler: Arc<Reconciler>,
    pub hostname: String,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            reconciler: Arc::new(Reconciler::new(storage.clone())),
            storage,
            hostname,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

// API response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub hostname: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub sessions: Vec<SessionListEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListEntry {
    #[serde(flatten)]
    pub session: Session,
    pub event_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session: Session,
    pub events: Vec<InteractionEvent>,
}

/// POST /api/events
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(batch): Json<EventBatch>,
) -> Result<Json<IngestReceipt>, ApiError> {
    let receipt = state.reconciler.ingest(batch).await?;
    Ok(Json(receipt))
}

/// GET /api/sessions?page=N&limit=M
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let offset = (page - 1) * limit;

    let total = state.storage.count_sessions().await?;
    let summaries = state.storage.list_sessions(limit, offset).await?;

    Ok(Json(SessionsResponse {
        sessions: summaries
            .into_iter()
            .map(|summary| SessionListEntry {
                session: summary.session,
                event_count: summary.event_count,
            })
            .collect(),
        pagination: Pagination {
            total,
            page,
            page_size: limit,
            page_count: total.div_ceil(limit),
        },
    }))
}

/// GET /api/sessions/:id
///
/// Returns the session plus its full event list in replay order; this is
/// the timeline-fetch contract the replay player loads from.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, ApiError> {
    let session = state
        .storage
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session not found: {}", id)))?;

    let mut rows = state.storage.session_event_rows(&id).await?;
    // Rows arrive in insertion order; a stable sort by timestamp gives
    // replay order with arrival-order ties.
    rows.sort_by_key(|row| row.event.timestamp());

    Ok(Json(SessionDetail {
        session,
        events: rows.into_iter().map(|row| row.event).collect(),
    }))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        hostname: state.hostname.clone(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::InvalidPayload(msg) => ApiError::BadRequest(msg),
            // Storage failures surface with the real cause, not a generic
            // message.
            IngestError::Storage(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::InternalError(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
