//! Pub/sub topic naming.
//!
//! Two topic shapes exist: one per worker (`worker:{id}`) and a single
//! global topic every connection is subscribed to (`broadcast:all`).

/// Global topic joined by every connection on connect.
pub const BROADCAST_ALL: &str = "broadcast:all";

/// Prefix of per-worker topics.
pub const WORKER_TOPIC_PREFIX: &str = "worker:";

/// Topic carrying events for a single worker.
pub fn worker_topic(worker_id: &str) -> String {
    format!("{WORKER_TOPIC_PREFIX}{worker_id}")
}
