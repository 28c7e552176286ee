//! Worker pool defaults and identity helpers.
//!
//! Pure functions and constants used by the engine configuration, the pool
//! itself and the API's pool-status endpoint.

use crate::error::CoreError;
use crate::types::WorkerId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of worker slots when `WORKER_POOL_SIZE` is not set.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Upper bound on the pool size; each slot may run one processor call.
pub const MAX_POOL_SIZE: usize = 64;

/// Seconds between poll ticks when `POLL_INTERVAL_SECS` is not set.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Cap on jobs fetched per tick when `MAX_JOBS_PER_TICK` is not set.
pub const DEFAULT_MAX_JOBS_PER_TICK: usize = 10;

/// Prefix shared by every worker identity.
const WORKER_ID_PREFIX: &str = "worker-";

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Identity of the `n`-th worker slot (1-based).
pub fn worker_id(n: usize) -> WorkerId {
    format!("{WORKER_ID_PREFIX}{n}")
}

/// Identities of a pool with `size` slots, in slot order.
pub fn worker_ids(size: usize) -> Vec<WorkerId> {
    (1..=size).map(worker_id).collect()
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// How many pending jobs a tick should fetch.
///
/// Never more than there are free workers, never more than the per-tick cap.
pub fn pending_fetch_limit(max_jobs_per_tick: usize, available_workers: usize) -> usize {
    max_jobs_per_tick.min(available_workers)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a configured pool size.
pub fn validate_pool_size(size: usize) -> Result<(), CoreError> {
    if size == 0 {
        return Err(CoreError::Validation(
            "Worker pool size must be at least 1".to_string(),
        ));
    }
    if size > MAX_POOL_SIZE {
        return Err(CoreError::Validation(format!(
            "Worker pool size must not exceed {MAX_POOL_SIZE}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_ids_are_one_based() {
        assert_eq!(worker_ids(3), vec!["worker-1", "worker-2", "worker-3"]);
    }

    #[test]
    fn fetch_limit_bounded_by_free_workers() {
        assert_eq!(pending_fetch_limit(10, 2), 2);
        assert_eq!(pending_fetch_limit(3, 8), 3);
        assert_eq!(pending_fetch_limit(10, 0), 0);
    }

    #[test]
    fn zero_pool_rejected() {
        assert!(validate_pool_size(0).is_err());
    }

    #[test]
    fn oversized_pool_rejected() {
        assert!(validate_pool_size(MAX_POOL_SIZE + 1).is_err());
        assert!(validate_pool_size(MAX_POOL_SIZE).is_ok());
    }
}
