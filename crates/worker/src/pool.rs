//! Fixed-size pool of worker slots.
//!
//! Guarantees at most one job per worker and at most one worker per job.
//! Each slot sits behind its own lock; `assign` flips a free slot to busy
//! under that lock and only then spawns the executor, so two concurrent
//! callers can never claim the same slot. A job -> worker binding index
//! rejects a second assignment of a job that is already bound.
//!
//! Executors run in a [`JoinSet`] owned by the pool. Finished tasks are
//! collected by [`WorkerPool::reap`], which the poller calls every tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use linguist_core::types::{DbId, Timestamp, WorkerId};
use linguist_core::worker_pool::worker_ids;
use linguist_db::models::job::Job;
use linguist_events::ProgressBroadcaster;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::executor::{ExecutionContext, ExecutionReport, JobExecutor};
use crate::processor::Processor;
use crate::store::JobStore;

/// Why a job could not be assigned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    /// Every worker is busy. The job stays pending until a later tick.
    #[error("No worker available")]
    Exhausted,

    /// The job is already bound to a worker.
    #[error("Job {job_id} is already assigned to {worker_id}")]
    AlreadyAssigned { job_id: DbId, worker_id: WorkerId },

    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub available: bool,
    pub current_job_id: Option<DbId>,
    pub last_assigned_at: Option<Timestamp>,
}

/// Point-in-time view of the whole pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub total_workers: usize,
    pub available_workers: usize,
    pub active_jobs: usize,
    pub worker_ids: Vec<WorkerId>,
    pub workers: Vec<WorkerSnapshot>,
}

/// Lock a mutex, recovering the guard if a holder panicked. Slot state is
/// only ever replaced wholesale, so a poisoned value is still consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct SlotState {
    current_job_id: Option<DbId>,
    last_assigned_at: Option<Timestamp>,
    cancel: Option<CancellationToken>,
}

impl SlotState {
    fn is_available(&self) -> bool {
        self.current_job_id.is_none()
    }

    /// Clear the assignment, returning the job it held.
    fn clear(&mut self) -> Option<DbId> {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.current_job_id.take()
    }
}

struct WorkerSlot {
    id: WorkerId,
    state: Mutex<SlotState>,
}

/// Slot table shared between the pool and its executors.
///
/// Lock order is always slot, then bindings.
pub(crate) struct SlotTable {
    slots: Vec<WorkerSlot>,
    bindings: Mutex<HashMap<DbId, WorkerId>>,
}

impl SlotTable {
    fn new(size: usize) -> Self {
        Self {
            slots: worker_ids(size)
                .into_iter()
                .map(|id| WorkerSlot {
                    id,
                    state: Mutex::new(SlotState::default()),
                })
                .collect(),
            bindings: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, worker_id: &str) -> Option<&WorkerSlot> {
        self.slots.iter().find(|slot| slot.id == worker_id)
    }

    fn unbind(&self, job_id: DbId) {
        lock(&self.bindings).remove(&job_id);
    }

    fn release(&self, worker_id: &str) -> Option<DbId> {
        let slot = self.slot(worker_id)?;
        let mut state = lock(&slot.state);
        let job_id = state.clear()?;
        self.unbind(job_id);
        Some(job_id)
    }

    /// Release `worker_id` only if it still holds `job_id`.
    pub(crate) fn release_assignment(&self, worker_id: &str, job_id: DbId) -> bool {
        let Some(slot) = self.slot(worker_id) else {
            return false;
        };
        let mut state = lock(&slot.state);
        if state.current_job_id != Some(job_id) {
            return false;
        }
        state.clear();
        self.unbind(job_id);
        true
    }

    fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.slots
            .iter()
            .map(|slot| {
                let state = lock(&slot.state);
                WorkerSnapshot {
                    id: slot.id.clone(),
                    available: state.is_available(),
                    current_job_id: state.current_job_id,
                    last_assigned_at: state.last_assigned_at,
                }
            })
            .collect()
    }
}

/// The worker pool. Shared by `Arc` between the poller and the API.
pub struct WorkerPool {
    slots: Arc<SlotTable>,
    context: Arc<ExecutionContext>,
    tasks: Mutex<JoinSet<ExecutionReport>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Create a pool of `size` idle workers named `worker-1..=worker-{size}`.
    pub fn new(
        size: usize,
        store: Arc<dyn JobStore>,
        processor: Arc<dyn Processor>,
        broadcaster: ProgressBroadcaster,
    ) -> Self {
        Self {
            slots: Arc::new(SlotTable::new(size)),
            context: Arc::new(ExecutionContext {
                store,
                processor,
                broadcaster,
            }),
            tasks: Mutex::new(JoinSet::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.slots.len()
    }

    /// Identities of idle workers, in slot order.
    pub fn available_workers(&self) -> Vec<WorkerId> {
        self.slots
            .slots
            .iter()
            .filter(|slot| lock(&slot.state).is_available())
            .map(|slot| slot.id.clone())
            .collect()
    }

    /// Worker currently bound to `job_id`, if any.
    pub fn worker_for_job(&self, job_id: DbId) -> Option<WorkerId> {
        lock(&self.slots.bindings).get(&job_id).cloned()
    }

    /// Bind `job` to the first idle worker and start its executor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn assign(&self, job: &Job) -> Result<WorkerId, AssignError> {
        if self.shutdown.is_cancelled() {
            return Err(AssignError::ShuttingDown);
        }

        for slot in &self.slots.slots {
            let mut state = lock(&slot.state);
            if !state.is_available() {
                continue;
            }

            {
                let mut bindings = lock(&self.slots.bindings);
                if let Some(bound) = bindings.get(&job.id) {
                    return Err(AssignError::AlreadyAssigned {
                        job_id: job.id,
                        worker_id: bound.clone(),
                    });
                }
                bindings.insert(job.id, slot.id.clone());
            }

            let cancel = self.shutdown.child_token();
            state.current_job_id = Some(job.id);
            state.last_assigned_at = Some(Utc::now());
            state.cancel = Some(cancel.clone());
            drop(state);

            self.spawn_executor(job.clone(), slot.id.clone(), cancel);
            tracing::info!(job_id = job.id, worker_id = %slot.id, "Job assigned");
            return Ok(slot.id.clone());
        }

        // Every slot is busy; report a binding if the job holds one of them.
        match self.worker_for_job(job.id) {
            Some(worker_id) => Err(AssignError::AlreadyAssigned {
                job_id: job.id,
                worker_id,
            }),
            None => Err(AssignError::Exhausted),
        }
    }

    fn spawn_executor(&self, job: Job, worker_id: WorkerId, cancel: CancellationToken) {
        let executor = JobExecutor::new(
            job,
            worker_id,
            cancel,
            Arc::clone(&self.context),
            Arc::clone(&self.slots),
        );
        lock(&self.tasks).spawn(executor.run());
    }

    /// Free a worker and cancel whatever it was running.
    ///
    /// Idempotent: releasing an idle or unknown worker does nothing.
    /// Returns the job the worker held.
    pub fn release(&self, worker_id: &str) -> Option<DbId> {
        let released = self.slots.release(worker_id);
        if let Some(job_id) = released {
            tracing::info!(job_id, worker_id, "Worker released");
        }
        released
    }

    /// Free whichever worker holds `job_id`. Returns that worker.
    pub fn release_job(&self, job_id: DbId) -> Option<WorkerId> {
        let worker_id = self.worker_for_job(job_id)?;
        self.slots
            .release_assignment(&worker_id, job_id)
            .then(|| {
                tracing::info!(job_id, worker_id = %worker_id, "Worker released for job");
                worker_id
            })
    }

    pub fn status(&self) -> PoolStatus {
        let workers = self.slots.snapshot();
        let available_workers = workers.iter().filter(|w| w.available).count();
        PoolStatus {
            total_workers: workers.len(),
            available_workers,
            active_jobs: workers.len() - available_workers,
            worker_ids: workers.iter().map(|w| w.id.clone()).collect(),
            workers,
        }
    }

    /// Collect finished executor tasks. Returns how many were collected.
    pub fn reap(&self) -> usize {
        let mut tasks = lock(&self.tasks);
        let mut reaped = 0;
        while let Some(result) = tasks.try_join_next() {
            reaped += 1;
            log_task_result(result);
        }
        reaped
    }

    /// Number of executor tasks not yet reaped.
    pub fn running_tasks(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Cancel every assignment and wait up to `grace` for executors to
    /// finish. Executors still running after that are aborted.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown.cancel();
        let mut tasks = std::mem::take(&mut *lock(&self.tasks));
        let pending = tasks.len();
        tracing::info!(pending, "Shutting down worker pool");

        let drained = tokio::time::timeout(grace, async {
            while let Some(result) = tasks.join_next().await {
                log_task_result(result);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                "Executors did not stop within the grace period, aborting"
            );
            tasks.shutdown().await;
        }
    }
}

fn log_task_result(result: Result<ExecutionReport, tokio::task::JoinError>) {
    match result {
        Ok(report) => tracing::debug!(
            job_id = report.job_id,
            worker_id = %report.worker_id,
            outcome = ?report.outcome,
            "Executor finished"
        ),
        Err(e) if e.is_cancelled() => tracing::warn!(error = %e, "Executor task aborted"),
        Err(e) => tracing::error!(error = %e, "Executor task terminated abnormally"),
    }
}
