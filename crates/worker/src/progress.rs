//! Progress reporting handed to processors.
//!
//! Each checkpoint is written to the store and pushed to the worker's topic.
//! The two are independent: a failed store write is logged and the
//! broadcast still happens.

use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::Arc;

use chrono::Utc;
use linguist_core::types::{DbId, WorkerId};
use linguist_db::models::status::JobStatus;
use linguist_events::{ProgressBroadcaster, ProgressUpdate};

use crate::store::JobStore;

/// Reports checkpoints for one job on one worker.
pub struct ProgressReporter {
    job_id: DbId,
    job_name: String,
    worker_id: WorkerId,
    store: Arc<dyn JobStore>,
    broadcaster: ProgressBroadcaster,
    last_percent: AtomicI16,
}

impl ProgressReporter {
    pub fn new(
        job_id: DbId,
        job_name: impl Into<String>,
        worker_id: impl Into<WorkerId>,
        store: Arc<dyn JobStore>,
        broadcaster: ProgressBroadcaster,
    ) -> Self {
        Self {
            job_id,
            job_name: job_name.into(),
            worker_id: worker_id.into(),
            store,
            broadcaster,
            last_percent: AtomicI16::new(0),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Highest percentage reported so far.
    pub fn last_percent(&self) -> i16 {
        self.last_percent.load(Ordering::Acquire)
    }

    /// Record a checkpoint.
    ///
    /// `percent` is clamped to `0..=100` and never goes below a previously
    /// reported value.
    pub async fn report(&self, percent: i16, step: impl Into<String>) {
        let requested = percent.clamp(0, 100);
        let percent = self
            .last_percent
            .fetch_max(requested, Ordering::AcqRel)
            .max(requested);
        let step = step.into();

        match self.store.mark_progress(self.job_id, percent, &step).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                job_id = self.job_id,
                percent,
                "Progress not stored, job is no longer running"
            ),
            Err(e) => tracing::warn!(
                job_id = self.job_id,
                percent,
                error = %e,
                "Failed to store job progress"
            ),
        }

        let update = ProgressUpdate {
            job_id: self.job_id,
            worker_id: self.worker_id.clone(),
            job_name: self.job_name.clone(),
            progress_percent: percent,
            current_step: step,
            status: JobStatus::Running,
            timestamp: Utc::now(),
        };
        self.broadcaster
            .broadcast_progress(&self.worker_id, update)
            .await;
    }
}
