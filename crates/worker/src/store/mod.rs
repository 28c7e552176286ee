//! Persistence port for localization jobs.
//!
//! The engine and the API only talk to [`JobStore`]. Two adapters exist:
//! [`PgJobStore`] over the `jobs` table and [`MemoryJobStore`] for tests and
//! local runs without a database. Both apply the same write guards, so the
//! poller and the executors may race on a row without clobbering each
//! other.

mod memory;
mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

use async_trait::async_trait;
use linguist_core::types::DbId;
use linguist_db::models::job::{CreateJob, Job, JobListQuery, JobPage, PatchJobStatus};
use linguist_db::models::status::JobStatus;

/// Errors returned by a [`JobStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job {0} not found")]
    NotFound(DbId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Job persistence as seen by the scheduler and the API.
///
/// The `mark_*` methods return `Ok(false)` when the row exists but its
/// current status does not allow the write.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job.
    async fn create(&self, input: &CreateJob) -> StoreResult<Job>;

    async fn get(&self, job_id: DbId) -> StoreResult<Option<Job>>;

    /// Newest first, optionally filtered by status.
    async fn list(&self, query: &JobListQuery) -> StoreResult<JobPage>;

    /// Up to `limit` pending jobs, oldest first.
    async fn fetch_pending(&self, limit: usize) -> StoreResult<Vec<Job>>;

    /// `pending -> running`, recording the worker.
    async fn mark_running(&self, job_id: DbId, worker_id: &str) -> StoreResult<bool>;

    /// Progress checkpoint on a running job. Stored progress never decreases.
    async fn mark_progress(&self, job_id: DbId, percent: i16, step: &str) -> StoreResult<bool>;

    async fn mark_completed(
        &self,
        job_id: DbId,
        worker_id: &str,
        results: &serde_json::Value,
    ) -> StoreResult<bool>;

    async fn mark_failed(&self, job_id: DbId, worker_id: &str, error: &str) -> StoreResult<bool>;

    /// `running -> cancelled` after the worker's assignment was cancelled.
    async fn mark_cancelled(&self, job_id: DbId) -> StoreResult<bool>;

    /// Manual status override. Fails with [`StoreError::Conflict`] when the
    /// transition is not allowed from the job's current status.
    async fn patch_status(&self, job_id: DbId, patch: &PatchJobStatus) -> StoreResult<Job>;

    /// New pending job copying the parameters of a failed or cancelled one.
    async fn retry(&self, job_id: DbId) -> StoreResult<Job>;

    /// Cancel jobs left running by a previous process. Returns the count.
    async fn cancel_orphaned(&self) -> StoreResult<u64>;

    /// Cheap reachability probe for health checks.
    async fn ping(&self) -> StoreResult<()>;
}

/// Reject manual overrides the status machine does not allow.
pub(crate) fn check_override(job: &Job, target: JobStatus) -> StoreResult<()> {
    if job.status.can_override_to(target) {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "Cannot change job {} from {} to {}",
            job.id, job.status, target
        )))
    }
}

/// Only failed or cancelled jobs can be resubmitted.
pub(crate) fn check_retryable(job: &Job) -> StoreResult<()> {
    match job.status {
        JobStatus::Failed | JobStatus::Cancelled => Ok(()),
        other => Err(StoreError::Conflict(format!(
            "Only failed or cancelled jobs can be retried (job {} is {other})",
            job.id
        ))),
    }
}
