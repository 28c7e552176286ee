//! Job entity models and DTOs for localization jobs.

use linguist_core::types::{DbId, Timestamp, WorkerId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::status::JobStatus;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: DbId,
    pub name: String,
    pub catalog_id: String,
    pub from_locale: String,
    pub to_locale: String,
    /// Opaque processor input, typically `{"item_ids": [...]}`.
    pub payload: serde_json::Value,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: JobStatus,
    pub progress_percent: i16,
    pub current_step: Option<String>,
    /// Set once when the job is assigned; never changes afterwards.
    pub worker_id: Option<WorkerId>,
    pub error_message: Option<String>,
    pub results: Option<serde_json::Value>,
    pub retry_of_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// DTO for creating a job via `POST /api/v1/jobs`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJob {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub catalog_id: String,
    pub from_locale: String,
    pub to_locale: String,
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
}

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    /// 1-based page number. Defaults to 1.
    pub page: Option<i64>,
    /// Defaults to 20, capped at 100.
    pub page_size: Option<i64>,
}

/// One page of a job listing, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub items: Vec<Job>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Manual status override via `PATCH /api/v1/jobs/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchJobStatus {
    pub status: JobStatus,
    pub progress_percent: Option<i16>,
    pub current_step: Option<String>,
    pub error_message: Option<String>,
}
