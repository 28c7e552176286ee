pub mod health;
pub mod jobs;
pub mod workers;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                       WebSocket (join/leave worker topics)
///
/// /jobs                     list, create
/// /jobs/{id}                get
/// /jobs/{id}/status         manual status override (PATCH)
/// /jobs/{id}/retry          resubmit a failed or cancelled job (POST)
///
/// /workers/status           worker pool snapshot
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/jobs", jobs::router())
        .nest("/workers", workers::router())
}
