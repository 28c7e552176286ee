//! Localization job orchestration.
//!
//! - [`store`]: the [`JobStore`] port with PostgreSQL and in-memory adapters.
//! - [`processor`]: the [`Processor`] port that performs the translation.
//! - [`pool`]: the fixed-size [`WorkerPool`] that binds jobs to workers.
//! - [`executor`]: one supervised task per assignment.
//! - [`poller`]: the background loop matching pending jobs to free workers.
//! - [`engine`]: wiring of the above with startup recovery and shutdown.

pub mod config;
pub mod engine;
pub mod executor;
pub mod poller;
pub mod pool;
pub mod processor;
pub mod progress;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use executor::ExecutionOutcome;
pub use poller::{JobPoller, TickReport};
pub use pool::{AssignError, PoolStatus, WorkerPool, WorkerSnapshot};
pub use processor::{ProcessError, Processor};
pub use progress::ProgressReporter;
pub use store::{JobStore, MemoryJobStore, PgJobStore, StoreError};

// Re-export so processor implementations need not depend on tokio-util.
pub use tokio_util::sync::CancellationToken;
