//! Runs one assigned job to a terminal state.
//!
//! | Processor result            | Store write      | Event                          |
//! |-----------------------------|------------------|--------------------------------|
//! | `Ok(results)`               | `mark_completed` | `job_completed` (`completed`)  |
//! | `Err(Cancelled)` or token   | `mark_cancelled` | `job_completed` (`cancelled`)  |
//! | other `Err`                 | `mark_failed`    | `job_error`                    |
//! | panic                       | `mark_failed`    | `job_error` (`executor crashed`) |
//!
//! Before the processor runs, the executor re-reads the job. A job that is
//! no longer pending, or running on this worker, came from a stale poll
//! snapshot and is skipped without processing or events.
//!
//! An event is skipped when the store reports the job had already left the
//! active statuses (a manual override got there first). A store error does
//! not suppress the event. The worker is released by a drop guard on every
//! path, including a panic.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use linguist_core::types::{DbId, Timestamp, WorkerId};
use linguist_db::models::job::Job;
use linguist_db::models::status::JobStatus;
use linguist_events::{JobComplete, JobError, ProgressBroadcaster};
use tokio_util::sync::CancellationToken;

use crate::pool::SlotTable;
use crate::processor::{ProcessError, Processor};
use crate::progress::ProgressReporter;
use crate::store::{JobStore, StoreResult};

/// Error message stored when an executor panics.
pub const EXECUTOR_CRASHED: &str = "executor crashed";

/// Collaborators shared by every executor of a pool.
pub(crate) struct ExecutionContext {
    pub store: Arc<dyn JobStore>,
    pub processor: Arc<dyn Processor>,
    pub broadcaster: ProgressBroadcaster,
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    Failed,
    Cancelled,
    Crashed,
    /// The job had already left the statuses this worker may run.
    Skipped,
}

/// Value returned by an executor task to the pool.
#[derive(Debug)]
pub struct ExecutionReport {
    pub job_id: DbId,
    pub worker_id: WorkerId,
    pub outcome: ExecutionOutcome,
}

/// Releases the worker when the executor finishes, unless it has already
/// moved on to another job.
struct ReleaseGuard {
    slots: Arc<SlotTable>,
    worker_id: WorkerId,
    job_id: DbId,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if self.slots.release_assignment(&self.worker_id, self.job_id) {
            tracing::debug!(job_id = self.job_id, worker_id = %self.worker_id, "Worker freed");
        }
    }
}

pub(crate) struct JobExecutor {
    job: Job,
    worker_id: WorkerId,
    cancel: CancellationToken,
    context: Arc<ExecutionContext>,
    slots: Arc<SlotTable>,
}

impl JobExecutor {
    pub(crate) fn new(
        job: Job,
        worker_id: WorkerId,
        cancel: CancellationToken,
        context: Arc<ExecutionContext>,
        slots: Arc<SlotTable>,
    ) -> Self {
        Self {
            job,
            worker_id,
            cancel,
            context,
            slots,
        }
    }

    pub(crate) async fn run(self) -> ExecutionReport {
        let _release = ReleaseGuard {
            slots: Arc::clone(&self.slots),
            worker_id: self.worker_id.clone(),
            job_id: self.job.id,
        };
        let started_at = Utc::now();
        tracing::info!(job_id = self.job.id, worker_id = %self.worker_id, "Executor started");

        let outcome = match AssertUnwindSafe(self.execute(started_at)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                tracing::error!(
                    job_id = self.job.id,
                    worker_id = %self.worker_id,
                    panic = panic_message(payload.as_ref()),
                    "Executor panicked"
                );
                self.fail(EXECUTOR_CRASHED).await;
                ExecutionOutcome::Crashed
            }
        };

        ExecutionReport {
            job_id: self.job.id,
            worker_id: self.worker_id.clone(),
            outcome,
        }
    }

    async fn execute(&self, started_at: Timestamp) -> ExecutionOutcome {
        if !self.still_runnable().await {
            return ExecutionOutcome::Skipped;
        }

        let reporter = ProgressReporter::new(
            self.job.id,
            self.job.name.clone(),
            self.worker_id.clone(),
            Arc::clone(&self.context.store),
            self.context.broadcaster.clone(),
        );

        let result = self
            .context
            .processor
            .process(&self.job, &reporter, &self.cancel)
            .await;

        match result {
            Ok(results) => {
                self.complete(results, started_at).await;
                ExecutionOutcome::Completed
            }
            Err(ProcessError::Cancelled) => {
                self.cancelled(started_at).await;
                ExecutionOutcome::Cancelled
            }
            Err(e) if self.cancel.is_cancelled() => {
                tracing::debug!(job_id = self.job.id, error = %e, "Processor error after cancellation");
                self.cancelled(started_at).await;
                ExecutionOutcome::Cancelled
            }
            Err(e) => {
                self.fail(&e.to_string()).await;
                ExecutionOutcome::Failed
            }
        }
    }

    /// Whether the stored row still lets this worker run the job.
    ///
    /// Terminal statuses are absorbing, so a read is enough: a row seen as
    /// pending or running here can only move on through a guarded write. A
    /// store error does not block the run.
    async fn still_runnable(&self) -> bool {
        match self.context.store.get(self.job.id).await {
            Ok(Some(job)) => match job.status {
                JobStatus::Pending => true,
                JobStatus::Running if job.worker_id.as_deref() == Some(self.worker_id.as_str()) => true,
                status => {
                    tracing::info!(
                        job_id = self.job.id,
                        worker_id = %self.worker_id,
                        %status,
                        owner = job.worker_id.as_deref().unwrap_or("-"),
                        "Skipping job that is no longer runnable here"
                    );
                    false
                }
            },
            Ok(None) => {
                tracing::warn!(job_id = self.job.id, "Assigned job no longer exists");
                false
            }
            Err(e) => {
                tracing::warn!(job_id = self.job.id, error = %e, "Could not re-read job before processing");
                true
            }
        }
    }

    async fn complete(&self, results: serde_json::Value, started_at: Timestamp) {
        let stored = self
            .context
            .store
            .mark_completed(self.job.id, &self.worker_id, &results)
            .await;
        if !self.should_announce(stored, "completion") {
            return;
        }

        let completed_at = Utc::now();
        tracing::info!(job_id = self.job.id, worker_id = %self.worker_id, "Job completed");
        self.context
            .broadcaster
            .broadcast_completed(
                &self.worker_id,
                JobComplete {
                    job_id: self.job.id,
                    worker_id: self.worker_id.clone(),
                    status: JobStatus::Completed,
                    error_message: None,
                    completed_at,
                    duration_secs: (completed_at - started_at).num_seconds(),
                    results: Some(results),
                },
            )
            .await;
    }

    async fn cancelled(&self, started_at: Timestamp) {
        let stored = self.context.store.mark_cancelled(self.job.id).await;
        if !self.should_announce(stored, "cancellation") {
            return;
        }

        let completed_at = Utc::now();
        tracing::info!(job_id = self.job.id, worker_id = %self.worker_id, "Job cancelled");
        self.context
            .broadcaster
            .broadcast_completed(
                &self.worker_id,
                JobComplete {
                    job_id: self.job.id,
                    worker_id: self.worker_id.clone(),
                    status: JobStatus::Cancelled,
                    error_message: None,
                    completed_at,
                    duration_secs: (completed_at - started_at).num_seconds(),
                    results: None,
                },
            )
            .await;
    }

    async fn fail(&self, message: &str) {
        let stored = self
            .context
            .store
            .mark_failed(self.job.id, &self.worker_id, message)
            .await;
        if !self.should_announce(stored, "failure") {
            return;
        }

        tracing::warn!(job_id = self.job.id, worker_id = %self.worker_id, error = message, "Job failed");
        self.context
            .broadcaster
            .broadcast_failed(
                &self.worker_id,
                JobError {
                    job_id: self.job.id,
                    worker_id: self.worker_id.clone(),
                    error_message: message.to_string(),
                    timestamp: Utc::now(),
                },
            )
            .await;
    }

    /// Whether a terminal event should follow the store write.
    fn should_announce(&self, stored: StoreResult<bool>, what: &str) -> bool {
        match stored {
            Ok(true) => true,
            Ok(false) => {
                tracing::info!(
                    job_id = self.job.id,
                    what,
                    "Job already left the active statuses, outcome not recorded"
                );
                false
            }
            Err(e) => {
                tracing::error!(job_id = self.job.id, what, error = %e, "Failed to record job outcome");
                true
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
