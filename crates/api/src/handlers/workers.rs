//! Handlers for the `/workers` resource.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/workers/status
///
/// Snapshot of every worker slot and the pool totals.
pub async fn pool_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.pool.status(),
    })
}
