//! HTTP API integration tests
//!
//! Drives the full router with tower::ServiceExt::oneshot, with a stub
//! automation engine behind the orchestrator where a test needs one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use mentora_relay::config::EngineConfig;
use mentora_relay::services::orchestrator::ComputeOrchestrator;
use mentora_relay::{build_router, AppState};

/// Serve a stub engine on an ephemeral port, returning its base URL
async fn spawn_engine(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub engine");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Stub engine died");
    });
    format!("http://{}", addr)
}

/// Stub engine that answers score-analysis calls, counting them
fn score_engine(calls: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/webhook/score-analysis",
        post(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(json!({"output": {"score": "87.5%", "summary": "Strong analytical skills"}}))
            }
        }),
    )
}

async fn test_state(engine: EngineConfig) -> (TempDir, AppState) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let pool = mentora_relay::db::init_database_pool(&dir.path().join("relay.db"))
        .await
        .expect("Failed to initialize database");
    let orchestrator =
        ComputeOrchestrator::new(pool.clone(), engine).expect("Failed to build orchestrator");
    (dir, AppState::new(pool, orchestrator))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&body).expect("Body was not JSON")
}

#[tokio::test]
async fn test_health_endpoint_reports_module_identity() {
    let (_dir, state) = test_state(EngineConfig::default()).await;
    let app = build_router(state);

    let response = app
        .oneshot(get_request("/health"))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "mentora-relay");
    assert!(json["version"].is_string());
    assert!(json["uptime_seconds"].is_number());
    assert_eq!(json["cached_results"], 0);
}

#[tokio::test]
async fn test_compute_returns_normalized_score() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = spawn_engine(score_engine(calls.clone())).await;
    let engine = EngineConfig {
        base_url: base,
        ..EngineConfig::default()
    };
    let (_dir, state) = test_state(engine).await;

    let response = build_router(state)
        .oneshot(post_json(
            "/compute",
            json!({"subject_id": "learner-1", "task": "score-analysis"}),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["cached"], false);
    assert_eq!(json["fallback"], false);
    assert_eq!(json["result"]["score"], 87.5);
    assert_eq!(json["result"]["summary"], "Strong analytical skills");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_compute_rejects_unknown_task() {
    let (_dir, state) = test_state(EngineConfig::default()).await;

    let response = build_router(state)
        .oneshot(post_json(
            "/compute",
            json!({"subject_id": "learner-1", "task": "mind-reading"}),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = response_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_compute_rejects_blank_subject() {
    let (_dir, state) = test_state(EngineConfig::default()).await;

    let response = build_router(state)
        .oneshot(post_json(
            "/compute",
            json!({"subject_id": "   ", "task": "score-analysis"}),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compute_conflict_when_attempt_exceeds_ceiling() {
    let (_dir, state) = test_state(EngineConfig::default()).await;

    // Attempt 6 of a 5-attempt task is refused before any engine call.
    let response = build_router(state)
        .oneshot(post_json(
            "/compute",
            json!({"subject_id": "learner-1", "task": "score-analysis", "attempt": 6}),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = response_json(response).await;
    assert_eq!(json["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_results_listing_exposes_metadata_without_payloads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = spawn_engine(score_engine(calls)).await;
    let engine = EngineConfig {
        base_url: base,
        ..EngineConfig::default()
    };
    let (_dir, state) = test_state(engine).await;

    let compute = build_router(state.clone())
        .oneshot(post_json(
            "/compute",
            json!({"subject_id": "learner-2", "task": "score-analysis"}),
        ))
        .await
        .expect("Compute request failed");
    assert_eq!(compute.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(get_request("/results/learner-2"))
        .await
        .expect("Listing request failed");

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["subject_id"], "learner-2");

    let results = json["results"].as_array().expect("Expected results array");
    assert_eq!(results.len(), 1);
    let row = &results[0];
    assert_eq!(row["task"], "score-analysis");
    assert_eq!(row["status"], "completed");
    assert_eq!(row["revision"], 1);
    assert_eq!(row["expired"], false);
    assert!(row["id"].is_string());
    assert!(row["created_at"].is_string());
    assert!(row["expires_at"].is_string());
    assert!(row.get("payload").is_none(), "Listing must not leak payloads");
    assert!(row.get("raw_payload").is_none());
}

#[tokio::test]
async fn test_results_listing_empty_for_unknown_subject() {
    let (_dir, state) = test_state(EngineConfig::default()).await;

    let response = build_router(state)
        .oneshot(get_request("/results/nobody"))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["results"], json!([]));
}

#[tokio::test]
async fn test_cache_invalidate_reports_eviction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = spawn_engine(score_engine(calls)).await;
    let engine = EngineConfig {
        base_url: base,
        ..EngineConfig::default()
    };
    let (_dir, state) = test_state(engine).await;

    let compute = build_router(state.clone())
        .oneshot(post_json(
            "/compute",
            json!({"subject_id": "learner-3", "task": "score-analysis"}),
        ))
        .await
        .expect("Compute request failed");
    assert_eq!(compute.status(), StatusCode::OK);

    let invalidate_body = json!({"subject_id": "learner-3", "task": "score-analysis"});

    let first = build_router(state.clone())
        .oneshot(post_json("/cache/invalidate", invalidate_body.clone()))
        .await
        .expect("Invalidate request failed");
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(response_json(first).await["evicted"], true);

    let second = build_router(state)
        .oneshot(post_json("/cache/invalidate", invalidate_body))
        .await
        .expect("Invalidate request failed");
    assert_eq!(response_json(second).await["evicted"], false);
}
