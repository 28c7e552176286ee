//! Event payloads pushed to topic subscribers.
//!
//! Every event serializes as a JSON object tagged with a `type` field whose
//! value is one of the `MSG_TYPE_*` constants in
//! [`linguist_core::job_events`].

use chrono::Utc;
use linguist_core::types::{DbId, Timestamp, WorkerId};
use linguist_db::models::status::JobStatus;
use serde::{Deserialize, Serialize};

/// A progress checkpoint emitted while a job is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: DbId,
    pub worker_id: WorkerId,
    pub job_name: String,
    pub progress_percent: i16,
    pub current_step: String,
    pub status: JobStatus,
    pub timestamp: Timestamp,
}

/// Terminal outcome of a job that finished on a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobComplete {
    pub job_id: DbId,
    pub worker_id: WorkerId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub completed_at: Timestamp,
    /// Wall-clock seconds between execution start and completion.
    pub duration_secs: i64,
    pub results: Option<serde_json::Value>,
}

/// A processing failure on a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub job_id: DbId,
    pub worker_id: WorkerId,
    pub error_message: String,
    pub timestamp: Timestamp,
}

/// A job was submitted and is waiting for a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: DbId,
    pub job_name: String,
    pub timestamp: Timestamp,
}

impl JobCreated {
    pub fn new(job_id: DbId, job_name: impl Into<String>) -> Self {
        Self {
            job_id,
            job_name: job_name.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Envelope of everything a subscriber can receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    #[serde(rename = "job_progress")]
    Progress(ProgressUpdate),
    #[serde(rename = "job_completed")]
    Completed(JobComplete),
    #[serde(rename = "job_error")]
    Error(JobError),
    #[serde(rename = "job_created")]
    Created(JobCreated),
}

impl JobEvent {
    /// The `type` tag this event serializes with.
    pub fn message_type(&self) -> &'static str {
        use linguist_core::job_events::*;
        match self {
            JobEvent::Progress(_) => MSG_TYPE_JOB_PROGRESS,
            JobEvent::Completed(_) => MSG_TYPE_JOB_COMPLETED,
            JobEvent::Error(_) => MSG_TYPE_JOB_ERROR,
            JobEvent::Created(_) => MSG_TYPE_JOB_CREATED,
        }
    }

    /// Job the event refers to.
    pub fn job_id(&self) -> DbId {
        match self {
            JobEvent::Progress(e) => e.job_id,
            JobEvent::Completed(e) => e.job_id,
            JobEvent::Error(e) => e.job_id,
            JobEvent::Created(e) => e.job_id,
        }
    }
}
