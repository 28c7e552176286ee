#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use linguist_core::types::DbId;
use linguist_db::models::job::{CreateJob, Job, JobListQuery, JobPage, PatchJobStatus};
use linguist_db::models::status::JobStatus;
use linguist_events::{ProgressBroadcaster, TopicHub};
use linguist_worker::store::StoreResult;
use linguist_worker::{
    CancellationToken, JobStore, MemoryJobStore, ProcessError, Processor, ProgressReporter,
    StoreError, WorkerPool,
};
use tokio::sync::Semaphore;

/// Upper bound for any wait on background executors.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn new_job(name: &str) -> CreateJob {
    CreateJob {
        name: name.to_string(),
        catalog_id: "catalog-1".to_string(),
        from_locale: "en".to_string(),
        to_locale: "fr".to_string(),
        payload: serde_json::json!({"item_ids": [1, 2, 3]}),
    }
}

/// Create pending jobs in order, returning them oldest first.
pub async fn seed_jobs(store: &MemoryJobStore, names: &[&str]) -> Vec<Job> {
    let mut jobs = Vec::with_capacity(names.len());
    for name in names {
        jobs.push(store.create(&new_job(name)).await.unwrap());
    }
    jobs
}

pub struct Harness {
    pub store: Arc<MemoryJobStore>,
    pub hub: Arc<TopicHub>,
    pub pool: Arc<WorkerPool>,
}

pub fn harness(size: usize, processor: Arc<dyn Processor>) -> Harness {
    harness_with_store(size, processor, Arc::new(MemoryJobStore::new()))
}

pub fn harness_with_store(
    size: usize,
    processor: Arc<dyn Processor>,
    store: Arc<MemoryJobStore>,
) -> Harness {
    let hub = Arc::new(TopicHub::new());
    let pool = Arc::new(WorkerPool::new(
        size,
        store.clone(),
        processor,
        ProgressBroadcaster::new(Arc::clone(&hub)),
    ));
    Harness { store, hub, pool }
}

// ---------------------------------------------------------------------------
// Waiting
// ---------------------------------------------------------------------------

/// Poll `store` until `job_id` reaches `status`.
pub async fn wait_for_status(store: &dyn JobStore, job_id: DbId, status: JobStatus) -> Job {
    let result = tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            if let Some(job) = store.get(job_id).await.unwrap() {
                if job.status == status {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    result.unwrap_or_else(|_| panic!("job {job_id} never reached {status}"))
}

/// Poll until no worker holds a job.
pub async fn wait_until_idle(pool: &WorkerPool) {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while pool.status().active_jobs > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("pool never became idle");
}

/// Poll until the stored progress of `job_id` reaches `percent`.
pub async fn wait_for_progress(store: &dyn JobStore, job_id: DbId, percent: i16) {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            let job = store.get(job_id).await.unwrap().unwrap();
            if job.progress_percent >= percent {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("progress never reached the expected value");
}

// ---------------------------------------------------------------------------
// Processors
// ---------------------------------------------------------------------------

/// Reports 25%, waits for a permit (or cancellation), reports 75% and
/// completes.
pub struct GatedProcessor {
    gate: Semaphore,
}

impl GatedProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
        })
    }

    /// Let `n` waiting jobs finish.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl Processor for GatedProcessor {
    async fn process(
        &self,
        job: &Job,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ProcessError> {
        progress.report(25, "Translating").await;
        tokio::select! {
            _ = cancel.cancelled() => return Err(ProcessError::Cancelled),
            permit = self.gate.acquire() => permit.unwrap().forget(),
        }
        progress.report(75, "Reviewing").await;
        Ok(serde_json::json!({"job": job.name}))
    }
}

/// Completes immediately.
pub struct InstantProcessor;

#[async_trait]
impl Processor for InstantProcessor {
    async fn process(
        &self,
        _job: &Job,
        progress: &ProgressReporter,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ProcessError> {
        progress.report(100, "Done").await;
        Ok(serde_json::json!({"translated_items": 3}))
    }
}

/// Completes immediately and counts how often it ran.
#[derive(Default)]
pub struct CountingProcessor {
    runs: AtomicUsize,
}

impl CountingProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Processor for CountingProcessor {
    async fn process(
        &self,
        _job: &Job,
        progress: &ProgressReporter,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ProcessError> {
        self.runs.fetch_add(1, Ordering::AcqRel);
        progress.report(100, "Done").await;
        Ok(serde_json::json!({"translated_items": 3}))
    }
}

/// Always fails with a service error.
pub struct FailingProcessor(pub &'static str);

#[async_trait]
impl Processor for FailingProcessor {
    async fn process(
        &self,
        _job: &Job,
        _progress: &ProgressReporter,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ProcessError> {
        Err(ProcessError::Service(self.0.to_string()))
    }
}

/// Panics mid-processing.
pub struct PanickingProcessor;

#[async_trait]
impl Processor for PanickingProcessor {
    async fn process(
        &self,
        _job: &Job,
        progress: &ProgressReporter,
        _cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ProcessError> {
        progress.report(10, "About to crash").await;
        panic!("translation model exploded");
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Memory store with scripted faults: failing running writes and a frozen
/// pending snapshot served in place of the live one.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryJobStore,
    running_write_failures: AtomicUsize,
    stale_pending: Mutex<Option<Vec<Job>>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` running writes with a pool timeout.
    pub fn fail_running_writes(self, n: usize) -> Self {
        self.running_write_failures.store(n, Ordering::Release);
        self
    }

    /// Serve `snapshot` from the next `fetch_pending` call, once.
    pub fn serve_stale_pending(&self, snapshot: Vec<Job>) {
        *self.stale_pending.lock().unwrap() = Some(snapshot);
    }
}

#[async_trait]
impl JobStore for ScriptedStore {
    async fn create(&self, input: &CreateJob) -> StoreResult<Job> {
        self.inner.create(input).await
    }

    async fn get(&self, job_id: DbId) -> StoreResult<Option<Job>> {
        self.inner.get(job_id).await
    }

    async fn list(&self, query: &JobListQuery) -> StoreResult<JobPage> {
        self.inner.list(query).await
    }

    async fn fetch_pending(&self, limit: usize) -> StoreResult<Vec<Job>> {
        let stale = self.stale_pending.lock().unwrap().take();
        match stale {
            Some(snapshot) => Ok(snapshot.into_iter().take(limit).collect()),
            None => self.inner.fetch_pending(limit).await,
        }
    }

    async fn mark_running(&self, job_id: DbId, worker_id: &str) -> StoreResult<bool> {
        let remaining = self
            .running_write_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.mark_running(job_id, worker_id).await
    }

    async fn mark_progress(&self, job_id: DbId, percent: i16, step: &str) -> StoreResult<bool> {
        self.inner.mark_progress(job_id, percent, step).await
    }

    async fn mark_completed(
        &self,
        job_id: DbId,
        worker_id: &str,
        results: &serde_json::Value,
    ) -> StoreResult<bool> {
        self.inner.mark_completed(job_id, worker_id, results).await
    }

    async fn mark_failed(&self, job_id: DbId, worker_id: &str, error: &str) -> StoreResult<bool> {
        self.inner.mark_failed(job_id, worker_id, error).await
    }

    async fn mark_cancelled(&self, job_id: DbId) -> StoreResult<bool> {
        self.inner.mark_cancelled(job_id).await
    }

    async fn patch_status(&self, job_id: DbId, patch: &PatchJobStatus) -> StoreResult<Job> {
        self.inner.patch_status(job_id, patch).await
    }

    async fn retry(&self, job_id: DbId) -> StoreResult<Job> {
        self.inner.retry(job_id).await
    }

    async fn cancel_orphaned(&self) -> StoreResult<u64> {
        self.inner.cancel_orphaned().await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}
