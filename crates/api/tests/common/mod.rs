#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use linguist_api::config::ServerConfig;
use linguist_api::routes;
use linguist_api::state::AppState;
use linguist_db::models::job::Job;
use linguist_events::{ProgressBroadcaster, TopicHub};
use linguist_worker::{
    CancellationToken, MemoryJobStore, ProcessError, Processor, ProgressReporter, WorkerPool,
};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Runs until its worker is released.
pub struct UntilCancelled;

#[async_trait]
impl Processor for UntilCancelled {
    async fn process(
        &self,
        _job: &Job,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ProcessError> {
        progress.report(10, "Waiting").await;
        cancel.cancelled().await;
        Err(ProcessError::Cancelled)
    }
}

/// Handles the router shares with the test body.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub hub: Arc<TopicHub>,
    pub pool: Arc<WorkerPool>,
}

/// Build the full application router over an in-memory store and a
/// two-worker pool without a poller; tests assign jobs explicitly.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryJobStore::new());
    let hub = Arc::new(TopicHub::new());
    let broadcaster = ProgressBroadcaster::new(Arc::clone(&hub));
    let pool = Arc::new(WorkerPool::new(
        2,
        store.clone(),
        Arc::new(UntilCancelled),
        broadcaster.clone(),
    ));

    let state = AppState {
        store: store.clone(),
        config: Arc::new(test_config()),
        hub: Arc::clone(&hub),
        broadcaster,
        pool: Arc::clone(&pool),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        store,
        hub,
        pool,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_empty(app: &TestApp, uri: &str) -> Response {
    send(app, Request::post(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response {
    json_request(app, Method::POST, uri, body).await
}

pub async fn patch_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response {
    json_request(app, Method::PATCH, uri, body).await
}

async fn json_request(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A valid create-job body.
pub fn job_body(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "catalog_id": "spring-2026",
        "from_locale": "en",
        "to_locale": "de-DE",
        "payload": {"item_ids": ["sku-1", "sku-2"]},
    })
}

/// Create a job through the API and return its id.
pub async fn create_job(app: &TestApp, name: &str) -> i64 {
    let response = post_json(app, "/api/v1/jobs", job_body(name)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}
