//! Real-time job notifications.
//!
//! - [`TopicHub`]: topic-keyed publish/subscribe hub. Connections join
//!   `worker:{id}` topics explicitly and are always members of
//!   `broadcast:all`.
//! - [`ProgressBroadcaster`]: typed front end used by the job executors
//!   and the API to push [`JobEvent`]s to the right topics.
//! - [`messages`]: the event payloads sent to subscribers.

pub mod broadcaster;
pub mod hub;
pub mod messages;

pub use broadcaster::ProgressBroadcaster;
pub use hub::TopicHub;
pub use messages::{JobComplete, JobCreated, JobError, JobEvent, ProgressUpdate};
