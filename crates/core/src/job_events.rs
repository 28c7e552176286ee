//! Message type constants for real-time job events.
//!
//! These are the values of the `type` tag carried by every event pushed to
//! topic subscribers.

/// Progress update during job execution (percentage + current step).
pub const MSG_TYPE_JOB_PROGRESS: &str = "job_progress";

/// Job reached a terminal state (completed, or cancelled mid-flight).
pub const MSG_TYPE_JOB_COMPLETED: &str = "job_completed";

/// Job failed with an error.
pub const MSG_TYPE_JOB_ERROR: &str = "job_error";

/// A new job was submitted.
pub const MSG_TYPE_JOB_CREATED: &str = "job_created";
