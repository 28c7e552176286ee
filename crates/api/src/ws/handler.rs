use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use linguist_events::TopicHub;
use tokio::time::{interval_at, Instant};

use super::protocol::ClientCommand;
use crate::state::AppState;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with the topic hub and
/// served by two tasks (sender + receiver).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection with the hub (joins `broadcast:all`).
///   2. Spawns a sender task that serializes hub events to text frames and
///      pings the client periodically.
///   3. Processes join/leave commands on the current task.
///   4. Disconnects from the hub when either side closes.
async fn handle_socket(socket: WebSocket, hub: Arc<TopicHub>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = hub.connect(conn_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        let period = Duration::from_secs(HEARTBEAT_INTERVAL_SECS);
        let mut heartbeat = interval_at(Instant::now() + period, period);

        loop {
            let frame = tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            tracing::error!(conn_id = %sender_conn_id, error = %e, "Failed to serialize event");
                            continue;
                        }
                    },
                    // Hub dropped the connection (shutdown).
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                _ = heartbeat.tick() => Message::Ping(Default::default()),
            };

            if sink.send(frame).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_command(&hub, &conn_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    hub.disconnect(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

async fn handle_command(hub: &TopicHub, conn_id: &str, text: &str) {
    let command = match ClientCommand::parse(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Ignoring malformed client frame");
            return;
        }
    };

    let topic = command.topic();
    match command {
        ClientCommand::Join { .. } => {
            let joined = hub.join(conn_id, &topic).await;
            tracing::debug!(conn_id, topic = %topic, joined, "Joined topic");
        }
        ClientCommand::Leave { .. } => {
            let left = hub.leave(conn_id, &topic).await;
            tracing::debug!(conn_id, topic = %topic, left, "Left topic");
        }
    }
}
