use std::sync::Arc;

use linguist_events::{ProgressBroadcaster, TopicHub};
use linguist_worker::{JobStore, WorkerPool};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Job persistence.
    pub store: Arc<dyn JobStore>,
    pub config: Arc<ServerConfig>,
    /// Topic hub the WebSocket transport subscribes connections to.
    pub hub: Arc<TopicHub>,
    /// Publishes job events through `hub`.
    pub broadcaster: ProgressBroadcaster,
    /// Worker pool driven by the engine's poller.
    pub pool: Arc<WorkerPool>,
}
