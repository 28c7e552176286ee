//! WebSocket transport for job event topics.
//!
//! Each socket becomes a [`TopicHub`](linguist_events::TopicHub)
//! connection subscribed to `broadcast:all`. Clients follow individual
//! workers by sending [`ClientCommand`] frames.

mod handler;
pub mod protocol;

pub use handler::ws_handler;
pub use protocol::ClientCommand;
