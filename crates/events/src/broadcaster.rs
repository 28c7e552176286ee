//! Typed front end over [`TopicHub`] for job lifecycle notifications.
//!
//! Routing:
//!
//! | Operation                | `worker:{id}` | `broadcast:all` |
//! |--------------------------|:-------------:|:---------------:|
//! | `broadcast_progress`     | yes           |                 |
//! | `broadcast_completed`    | yes           | yes             |
//! | `broadcast_failed`       | yes           |                 |
//! | `broadcast_job_created`  |               | yes             |
//!
//! Delivery is fire-and-forget: nothing here returns an error, and an
//! event with no live subscriber is simply dropped.

use std::sync::Arc;

use linguist_core::topics::{worker_topic, BROADCAST_ALL};
use linguist_core::types::DbId;

use crate::hub::TopicHub;
use crate::messages::{JobComplete, JobCreated, JobError, JobEvent, ProgressUpdate};

/// Publishes job events to the topics their observers listen on.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    hub: Arc<TopicHub>,
}

impl ProgressBroadcaster {
    pub fn new(hub: Arc<TopicHub>) -> Self {
        Self { hub }
    }

    /// Progress checkpoint, to the worker topic only.
    pub async fn broadcast_progress(&self, worker_id: &str, update: ProgressUpdate) {
        let topic = worker_topic(worker_id);
        let delivered = self.hub.publish(&topic, JobEvent::Progress(update)).await;
        tracing::trace!(worker_id, delivered, "Progress broadcast");
    }

    /// Terminal outcome, to the worker topic and the global topic so that
    /// dashboards not following this worker still see it.
    pub async fn broadcast_completed(&self, worker_id: &str, result: JobComplete) {
        let topic = worker_topic(worker_id);
        let job_id = result.job_id;
        let delivered = self
            .hub
            .publish_many(&[topic.as_str(), BROADCAST_ALL], JobEvent::Completed(result))
            .await;
        tracing::debug!(job_id, worker_id, delivered, "Completion broadcast");
    }

    /// Processing failure, to the worker topic only.
    pub async fn broadcast_failed(&self, worker_id: &str, error: JobError) {
        let topic = worker_topic(worker_id);
        let job_id = error.job_id;
        let delivered = self.hub.publish(&topic, JobEvent::Error(error)).await;
        tracing::debug!(job_id, worker_id, delivered, "Failure broadcast");
    }

    /// New submission, to the global topic only.
    pub async fn broadcast_job_created(&self, job_id: DbId, job_name: &str) {
        let delivered = self
            .hub
            .publish(BROADCAST_ALL, JobEvent::Created(JobCreated::new(job_id, job_name)))
            .await;
        tracing::debug!(job_id, delivered, "Job creation broadcast");
    }
}
