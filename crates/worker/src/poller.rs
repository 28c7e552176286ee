//! Background loop that matches pending jobs with idle workers.
//!
//! Runs independently of request handling. A failed tick is logged and the
//! loop carries on at the next interval.

use std::sync::Arc;
use std::time::Duration;

use linguist_core::types::{DbId, WorkerId};
use linguist_core::worker_pool::pending_fetch_limit;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::pool::{AssignError, WorkerPool};
use crate::store::{JobStore, StoreError};

/// What a single tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Pending jobs returned by the store.
    pub fetched: usize,
    /// Newly bound `(job, worker)` pairs, in assignment order.
    pub assigned: Vec<(DbId, WorkerId)>,
    /// Jobs already bound whose running write was re-issued.
    pub repaired: usize,
    /// Jobs left pending because the pool filled up mid-batch.
    pub deferred: usize,
}

/// Periodic pending-job poller.
pub struct JobPoller {
    store: Arc<dyn JobStore>,
    pool: Arc<WorkerPool>,
    poll_interval: Duration,
    max_jobs_per_tick: usize,
}

impl JobPoller {
    pub fn new(
        store: Arc<dyn JobStore>,
        pool: Arc<WorkerPool>,
        poll_interval: Duration,
        max_jobs_per_tick: usize,
    ) -> Self {
        Self {
            store,
            pool,
            poll_interval,
            max_jobs_per_tick,
        }
    }

    /// Run the poll loop until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            max_jobs_per_tick = self.max_jobs_per_tick,
            workers = self.pool.size(),
            "Job poller started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) if !report.assigned.is_empty() || report.repaired > 0 => {
                            tracing::debug!(
                                fetched = report.fetched,
                                assigned = report.assigned.len(),
                                repaired = report.repaired,
                                deferred = report.deferred,
                                "Poll tick finished",
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Poll tick failed"),
                    }
                }
            }
        }
    }

    /// One poll cycle.
    ///
    /// Fetches at most `min(max_jobs_per_tick, idle workers)` pending jobs,
    /// oldest first, and assigns them in that order. Stops at the first
    /// [`AssignError::Exhausted`]; the rest stay pending for a later tick.
    pub async fn tick(&self) -> Result<TickReport, StoreError> {
        self.pool.reap();

        let available = self.pool.available_workers();
        if available.is_empty() {
            return Ok(TickReport::default());
        }

        let limit = pending_fetch_limit(self.max_jobs_per_tick, available.len());
        let pending = self.store.fetch_pending(limit).await?;
        let mut report = TickReport {
            fetched: pending.len(),
            ..TickReport::default()
        };

        for (index, job) in pending.iter().enumerate() {
            match self.pool.assign(job) {
                Ok(worker_id) => {
                    self.persist_running(job.id, &worker_id).await;
                    report.assigned.push((job.id, worker_id));
                }
                Err(AssignError::AlreadyAssigned { worker_id, .. }) => {
                    // The earlier running write failed, so the store still
                    // reads pending while a worker holds the job.
                    self.persist_running(job.id, &worker_id).await;
                    report.repaired += 1;
                }
                Err(AssignError::Exhausted) => {
                    report.deferred = pending.len() - index;
                    tracing::debug!(deferred = report.deferred, "Worker pool exhausted mid-batch");
                    break;
                }
                Err(AssignError::ShuttingDown) => break,
            }
        }

        Ok(report)
    }

    async fn persist_running(&self, job_id: DbId, worker_id: &str) {
        match self.store.mark_running(job_id, worker_id).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                job_id,
                worker_id,
                "Job already left pending before the running write"
            ),
            Err(e) => tracing::error!(
                job_id,
                worker_id,
                error = %e,
                "Failed to mark job running"
            ),
        }
    }
}
