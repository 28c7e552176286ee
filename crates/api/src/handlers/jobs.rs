//! Handlers for the `/jobs` resource.
//!
//! Jobs are created here and picked up by the engine's poller; nothing in
//! this module assigns work directly. A manual override to a terminal
//! status frees the worker that was running the job.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use linguist_core::error::CoreError;
use linguist_core::types::DbId;
use linguist_core::validation::{
    validate_job_name, validate_locale_pair, validate_progress, validate_step,
};
use linguist_db::models::job::{CreateJob, JobListQuery, PatchJobStatus};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a pending job and announce it on `broadcast:all`. Returns 201.
pub async fn create_job(
    State(state): State<AppState>,
    Json(input): Json<CreateJob>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    validate_job_name(&input.name)?;
    validate_locale_pair(&input.from_locale, &input.to_locale)?;

    let job = state.store.create(&input).await?;
    tracing::info!(
        job_id = job.id,
        catalog_id = %job.catalog_id,
        from_locale = %job.from_locale,
        to_locale = %job.to_locale,
        "Job created",
    );

    state.broadcaster.broadcast_job_created(job.id, &job.name).await;

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .store
        .get(job_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/jobs?status=&page=&page_size=
///
/// Newest first. `page` defaults to 1, `page_size` to 20 (max 100).
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let page = state.store.list(&params).await?;
    Ok(Json(DataResponse { data: page }))
}

// ---------------------------------------------------------------------------
// Manual override
// ---------------------------------------------------------------------------

/// PATCH /api/v1/jobs/{id}/status
///
/// Force a status, optionally with progress, step and error message.
/// Returns 409 when the transition is not allowed (e.g. reopening a
/// finished job).
pub async fn patch_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(patch): Json<PatchJobStatus>,
) -> AppResult<impl IntoResponse> {
    if let Some(percent) = patch.progress_percent {
        validate_progress(percent)?;
    }
    if let Some(step) = &patch.current_step {
        validate_step(step)?;
    }

    let job = state.store.patch_status(job_id, &patch).await?;
    tracing::info!(job_id, status = %job.status, "Job status overridden");

    // The store already holds the terminal status, so the executor's own
    // cancellation write is refused.
    if job.status.is_terminal() {
        if let Some(worker_id) = state.pool.release_job(job_id) {
            tracing::info!(job_id, worker_id = %worker_id, "Released worker after override");
        }
    }

    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/retry
///
/// Create a new pending job with the parameters of a failed or cancelled
/// one. The new job references the original via `retry_of_job_id`.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.retry(job_id).await?;
    tracing::info!(job_id = job.id, retry_of = job_id, "Job resubmitted");

    state.broadcaster.broadcast_job_created(job.id, &job.name).await;

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}
