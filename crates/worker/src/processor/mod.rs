//! The unit of work a worker runs.
//!
//! The engine does not know how a job is translated; it hands the job to a
//! [`Processor`] together with a [`ProgressReporter`] and the worker's
//! cancellation token.

mod http;

pub use http::{HttpProcessorConfig, HttpTranslationProcessor};

use async_trait::async_trait;
use linguist_db::models::job::Job;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressReporter;

/// Why a processor did not produce results.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The worker's cancellation token fired. Not a failure.
    #[error("Processing cancelled")]
    Cancelled,

    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("Translation service error: {0}")]
    Service(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Performs the translation work for one job.
///
/// Implementations must observe `cancel` and return
/// [`ProcessError::Cancelled`] promptly once it fires; the engine does not
/// abort processors forcibly.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Process `job`, reporting checkpoints through `progress`.
    ///
    /// Returns the results document stored on the job.
    async fn process(
        &self,
        job: &Job,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ProcessError>;
}
