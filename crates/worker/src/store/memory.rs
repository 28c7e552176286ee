use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use linguist_core::types::DbId;
use linguist_core::validation::{clamp_page, clamp_page_size, page_offset};
use linguist_db::models::job::{CreateJob, Job, JobListQuery, JobPage, PatchJobStatus};
use linguist_db::models::status::JobStatus;
use tokio::sync::RwLock;

use super::{check_override, check_retryable, JobStore, StoreError, StoreResult};

#[derive(Default)]
struct MemoryState {
    jobs: BTreeMap<DbId, Job>,
    last_id: DbId,
}

impl MemoryState {
    fn insert(&mut self, input: &CreateJob, retry_of: Option<DbId>) -> Job {
        self.last_id += 1;
        let now = Utc::now();
        let job = Job {
            id: self.last_id,
            name: input.name.clone(),
            catalog_id: input.catalog_id.clone(),
            from_locale: input.from_locale.clone(),
            to_locale: input.to_locale.clone(),
            payload: input.payload.clone(),
            status: JobStatus::Pending,
            progress_percent: 0,
            current_step: None,
            worker_id: None,
            error_message: None,
            results: None,
            retry_of_job_id: retry_of,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };
        self.jobs.insert(job.id, job.clone());
        job
    }

    /// The job, if its status is one of `allowed`.
    fn guarded(&mut self, job_id: DbId, allowed: &[JobStatus]) -> Option<&mut Job> {
        self.jobs
            .get_mut(&job_id)
            .filter(|job| allowed.contains(&job.status))
    }

    fn finalize(
        &mut self,
        job_id: DbId,
        worker_id: &str,
        status: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> bool {
        let Some(job) = self.guarded(job_id, &[JobStatus::Pending, JobStatus::Running]) else {
            return false;
        };
        let now = Utc::now();
        job.status = status;
        job.worker_id.get_or_insert_with(|| worker_id.to_string());
        job.started_at.get_or_insert(now);
        job.completed_at = Some(now);
        job.updated_at = now;
        apply(job);
        true
    }
}

/// In-process [`JobStore`] with the same guards as the PostgreSQL adapter.
///
/// Jobs live for the lifetime of the value. Used by tests and for local
/// runs of the engine without PostgreSQL.
#[derive(Default)]
pub struct MemoryJobStore {
    state: RwLock<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs in `status`.
    pub async fn count_by_status(&self, status: JobStatus) -> usize {
        self.state
            .read()
            .await
            .jobs
            .values()
            .filter(|job| job.status == status)
            .count()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, input: &CreateJob) -> StoreResult<Job> {
        Ok(self.state.write().await.insert(input, None))
    }

    async fn get(&self, job_id: DbId) -> StoreResult<Option<Job>> {
        Ok(self.state.read().await.jobs.get(&job_id).cloned())
    }

    async fn list(&self, query: &JobListQuery) -> StoreResult<JobPage> {
        let page = clamp_page(query.page);
        let page_size = clamp_page_size(query.page_size);
        let offset = page_offset(page, page_size);

        let state = self.state.read().await;
        let mut matching: Vec<&Job> = state
            .jobs
            .values()
            .filter(|job| query.status.map_or(true, |status| job.status == status))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(page_size as usize)
            .cloned()
            .collect();

        Ok(JobPage {
            items,
            page,
            page_size,
            total,
        })
    }

    async fn fetch_pending(&self, limit: usize) -> StoreResult<Vec<Job>> {
        let state = self.state.read().await;
        let mut pending: Vec<&Job> = state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .collect();
        pending.sort_by_key(|job| (job.created_at, job.id));
        Ok(pending.into_iter().take(limit).cloned().collect())
    }

    async fn mark_running(&self, job_id: DbId, worker_id: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(job) = state.guarded(job_id, &[JobStatus::Pending]) else {
            return Ok(false);
        };
        let now = Utc::now();
        job.status = JobStatus::Running;
        job.worker_id = Some(worker_id.to_string());
        job.started_at.get_or_insert(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn mark_progress(&self, job_id: DbId, percent: i16, step: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(job) = state.guarded(job_id, &[JobStatus::Running]) else {
            return Ok(false);
        };
        job.progress_percent = job.progress_percent.max(percent);
        job.current_step = Some(step.to_string());
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_completed(
        &self,
        job_id: DbId,
        worker_id: &str,
        results: &serde_json::Value,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.finalize(job_id, worker_id, JobStatus::Completed, |job| {
            job.progress_percent = 100;
            job.results = Some(results.clone());
        }))
    }

    async fn mark_failed(&self, job_id: DbId, worker_id: &str, error: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.finalize(job_id, worker_id, JobStatus::Failed, |job| {
            job.error_message = Some(error.to_string());
        }))
    }

    async fn mark_cancelled(&self, job_id: DbId) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(job) = state.guarded(job_id, &[JobStatus::Running]) else {
            return Ok(false);
        };
        let now = Utc::now();
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn patch_status(&self, job_id: DbId, patch: &PatchJobStatus) -> StoreResult<Job> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::NotFound(job_id))?;
        check_override(job, patch.status)?;

        let now = Utc::now();
        job.status = patch.status;
        if let Some(percent) = patch.progress_percent {
            // A job that stays active never loses progress.
            job.progress_percent = if patch.status.is_terminal() {
                percent
            } else {
                job.progress_percent.max(percent)
            };
        }
        if let Some(step) = &patch.current_step {
            job.current_step = Some(step.clone());
        }
        if let Some(message) = &patch.error_message {
            job.error_message = Some(message.clone());
        }
        if patch.status.is_terminal() {
            job.completed_at.get_or_insert(now);
        }
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn retry(&self, job_id: DbId) -> StoreResult<Job> {
        let mut state = self.state.write().await;
        let original = state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(StoreError::NotFound(job_id))?;
        check_retryable(&original)?;

        let input = CreateJob {
            name: original.name,
            catalog_id: original.catalog_id,
            from_locale: original.from_locale,
            to_locale: original.to_locale,
            payload: original.payload,
        };
        Ok(state.insert(&input, Some(job_id)))
    }

    async fn cancel_orphaned(&self) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut cancelled = 0;
        for job in state
            .jobs
            .values_mut()
            .filter(|job| job.status == JobStatus::Running)
        {
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(now);
            job.updated_at = now;
            cancelled += 1;
        }
        Ok(cancelled)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
