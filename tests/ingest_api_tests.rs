use rewind::storage::{DuckDbStorage, Storage};
use rewind::web::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;

/// Boot the collector router on an ephemeral port and return its base URL.
async fn start_collector() -> (String, Arc<DuckDbStorage>) {
    let storage = Arc::new(DuckDbStorage::in_memory().unwrap());
    storage.init_schema().await.unwrap();

    let state = AppState::new(storage.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    (format!("http://{}", addr), storage)
}

fn sample_batch(session_id: &str) -> Value {
    json!({
        "sessionId": session_id,
        "websiteId": "site-1",
        "events": [
            { "type": "mouseMove", "timestamp": 1000, "data": { "x": 10.0, "y": 20.0 } },
            { "type": "click", "timestamp": 1500, "data": { "x": 10.0, "y": 20.0, "target": "#btn" } },
            { "type": "scroll", "timestamp": 2000, "data": { "scrollX": 0.0, "scrollY": 120.0 } }
        ]
    })
}

#[tokio::test]
async fn test_ingest_batch_and_fetch_session() {
    let (base, _storage) = start_collector().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/events", base))
        .json(&sample_batch("sess-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let receipt: Value = response.json().await.unwrap();
    assert_eq!(receipt["status"], "success");
    assert_eq!(receipt["sessionId"], "sess-1");
    assert_eq!(receipt["eventsProcessed"], 3);

    let detail: Value = client
        .get(format!("{}/api/sessions/sess-1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["session"]["id"], "sess-1");
    assert_eq!(detail["session"]["websiteId"], "site-1");
    let events = detail["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    // Replay order by timestamp.
    assert_eq!(events[0]["type"], "mouseMove");
    assert_eq!(events[1]["type"], "click");
    assert_eq!(events[2]["type"], "scroll");
}

#[tokio::test]
async fn test_ingest_rejects_blank_session_id() {
    let (base, storage) = start_collector().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/events", base))
        .json(&json!({
            "sessionId": "   ",
            "websiteId": "site-1",
            "events": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("sessionId"));
    // Rejected before any mutation.
    assert_eq!(storage.count_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ingest_rejects_unknown_event_type() {
    let (base, _storage) = start_collector().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/events", base))
        .json(&json!({
            "sessionId": "sess-1",
            "websiteId": "site-1",
            "events": [
                { "type": "keypress", "timestamp": 1000, "data": { "key": "a" } }
            ]
        }))
        .send()
        .await
        .unwrap();
    // Deserialization fails at the boundary.
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn test_duplicate_batch_is_stored_again() {
    let (base, _storage) = start_collector().await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .post(format!("{}/api/events", base))
            .json(&sample_batch("sess-dup"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let detail: Value = client
        .get(format!("{}/api/sessions/sess-dup", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["events"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_empty_batch_is_valid() {
    let (base, _storage) = start_collector().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/events", base))
        .json(&json!({
            "sessionId": "sess-empty",
            "websiteId": "site-1",
            "events": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let receipt: Value = response.json().await.unwrap();
    assert_eq!(receipt["eventsProcessed"], 0);

    // The session itself was still registered.
    let detail = client
        .get(format!("{}/api/sessions/sess-empty", base))
        .send()
        .await
        .unwrap();
    assert_eq!(detail.status(), 200);
}

#[tokio::test]
async fn test_get_unknown_session_returns_404() {
    let (base, _storage) = start_collector().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/sessions/no-such-session", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("no-such-session"));
}

#[tokio::test]
async fn test_session_listing_pagination() {
    let (base, _storage) = start_collector().await;
    let client = reqwest::Client::new();

    for i in 0..5 {
        client
            .post(format!("{}/api/events", base))
            .json(&sample_batch(&format!("sess-{}", i)))
            .send()
            .await
            .unwrap();
    }

    let listing: Value = client
        .get(format!("{}/api/sessions?page=1&limit=2", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(listing["sessions"].as_array().unwrap().len(), 2);
    assert_eq!(listing["pagination"]["total"], 5);
    assert_eq!(listing["pagination"]["page"], 1);
    assert_eq!(listing["pagination"]["pageSize"], 2);
    assert_eq!(listing["pagination"]["pageCount"], 3);
    assert_eq!(listing["sessions"][0]["eventCount"], 3);

    // Out-of-range limits are clamped rather than rejected.
    let listing: Value = client
        .get(format!("{}/api/sessions?page=0&limit=500", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["pagination"]["page"], 1);
    assert_eq!(listing["pagination"]["pageSize"], 100);
    assert_eq!(listing["sessions"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (base, _storage) = start_collector().await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["hostname"].is_string());
    assert!(body["version"].is_string());
    assert!(body["uptimeSeconds"].is_number());
}
