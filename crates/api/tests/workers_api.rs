//! HTTP-level integration tests for `/api/v1/workers` and `/health`.

mod common;

use axum::http::StatusCode;
use common::*;
use linguist_worker::JobStore;

// ---------------------------------------------------------------------------
// Test: GET /api/v1/workers/status on an idle pool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pool_status_lists_idle_workers() {
    let app = build_test_app();
    let response = get(&app, "/api/v1/workers/status").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["total_workers"], 2);
    assert_eq!(json["data"]["available_workers"], 2);
    assert_eq!(json["data"]["active_jobs"], 0);
    assert_eq!(
        json["data"]["worker_ids"],
        serde_json::json!(["worker-1", "worker-2"])
    );
    assert_eq!(json["data"]["workers"][0]["available"], true);
    assert!(json["data"]["workers"][0]["current_job_id"].is_null());
}

// ---------------------------------------------------------------------------
// Test: an assigned job shows up on its worker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pool_status_reports_assignment() {
    let app = build_test_app();
    let id = create_job(&app, "Busy").await;
    let job = app.store.get(id).await.unwrap().unwrap();
    app.pool.assign(&job).unwrap();

    let json = body_json(get(&app, "/api/v1/workers/status").await).await;

    assert_eq!(json["data"]["available_workers"], 1);
    assert_eq!(json["data"]["active_jobs"], 1);
    assert_eq!(json["data"]["workers"][0]["id"], "worker-1");
    assert_eq!(json["data"]["workers"][0]["available"], false);
    assert_eq!(json["data"]["workers"][0]["current_job_id"], id);
    assert!(json["data"]["workers"][0]["last_assigned_at"].is_string());

    app.pool.release("worker-1");
}

// ---------------------------------------------------------------------------
// Test: GET /health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_reports_store_and_pool() {
    let app = build_test_app();
    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["store_healthy"], true);
    assert_eq!(json["total_workers"], 2);
}

// ---------------------------------------------------------------------------
// Test: unknown route and request id header
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app();
    let response = get(&app, "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app();
    let response = get(&app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}
