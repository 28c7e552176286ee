use async_trait::async_trait;
use linguist_core::types::DbId;
use linguist_db::models::job::{CreateJob, Job, JobListQuery, JobPage, PatchJobStatus};
use linguist_db::repositories::JobRepo;
use linguist_db::DbPool;

use super::{check_override, check_retryable, JobStore, StoreError, StoreResult};

/// [`JobStore`] backed by the PostgreSQL `jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn require(&self, job_id: DbId) -> StoreResult<Job> {
        JobRepo::find_by_id(&self.pool, job_id)
            .await?
            .ok_or(StoreError::NotFound(job_id))
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, input: &CreateJob) -> StoreResult<Job> {
        Ok(JobRepo::create(&self.pool, input).await?)
    }

    async fn get(&self, job_id: DbId) -> StoreResult<Option<Job>> {
        Ok(JobRepo::find_by_id(&self.pool, job_id).await?)
    }

    async fn list(&self, query: &JobListQuery) -> StoreResult<JobPage> {
        Ok(JobRepo::list(&self.pool, query).await?)
    }

    async fn fetch_pending(&self, limit: usize) -> StoreResult<Vec<Job>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(JobRepo::fetch_pending(&self.pool, limit).await?)
    }

    async fn mark_running(&self, job_id: DbId, worker_id: &str) -> StoreResult<bool> {
        Ok(JobRepo::mark_running(&self.pool, job_id, worker_id).await?)
    }

    async fn mark_progress(&self, job_id: DbId, percent: i16, step: &str) -> StoreResult<bool> {
        Ok(JobRepo::update_progress(&self.pool, job_id, percent, step).await?)
    }

    async fn mark_completed(
        &self,
        job_id: DbId,
        worker_id: &str,
        results: &serde_json::Value,
    ) -> StoreResult<bool> {
        Ok(JobRepo::complete(&self.pool, job_id, worker_id, results).await?)
    }

    async fn mark_failed(&self, job_id: DbId, worker_id: &str, error: &str) -> StoreResult<bool> {
        Ok(JobRepo::fail(&self.pool, job_id, worker_id, error).await?)
    }

    async fn mark_cancelled(&self, job_id: DbId) -> StoreResult<bool> {
        Ok(JobRepo::cancel_running(&self.pool, job_id).await?)
    }

    async fn patch_status(&self, job_id: DbId, patch: &PatchJobStatus) -> StoreResult<Job> {
        let current = self.require(job_id).await?;
        check_override(&current, patch.status)?;

        JobRepo::override_status(&self.pool, job_id, current.status, patch)
            .await?
            .ok_or_else(|| {
                StoreError::Conflict(format!(
                    "Job {job_id} changed status while the override was applied"
                ))
            })
    }

    async fn retry(&self, job_id: DbId) -> StoreResult<Job> {
        let original = self.require(job_id).await?;
        check_retryable(&original)?;
        Ok(JobRepo::retry(&self.pool, &original).await?)
    }

    async fn cancel_orphaned(&self) -> StoreResult<u64> {
        Ok(JobRepo::cancel_orphaned(&self.pool).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(linguist_db::health_check(&self.pool).await?)
    }
}
