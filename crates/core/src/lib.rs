//! Pure domain building blocks shared by every Linguist crate.
//!
//! Nothing in here performs I/O: identifiers, the domain error type,
//! validation helpers, pub/sub topic naming and worker-pool defaults.

pub mod error;
pub mod job_events;
pub mod topics;
pub mod types;
pub mod validation;
pub mod worker_pool;
