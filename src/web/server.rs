use super::api::{get_session, health_check, ingest_events, list_sessions, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the collector router: ingestion, session fetch/listing, health.
///
/// CORS is fully permissive since the capture SDK posts from whatever page
/// is being recorded.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/events", post(ingest_events))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the collector HTTP server with graceful shutdown.
pub async fn run_server(
    listen_addr: SocketAddr,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let app = build_router(state);

    info!(addr = %listen_addr, "Starting collector HTTP server");

    let listener = TcpListener::bind(listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            info!("Collector server shutting down gracefully");
        })
        .await
}
