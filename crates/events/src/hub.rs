//! Topic-keyed publish/subscribe hub.
//!
//! [`TopicHub`] keeps one unbounded channel per connection and a
//! `topic -> set<connection>` index. It is transport agnostic: the API's
//! WebSocket handler drains the receiver returned by [`TopicHub::connect`]
//! and writes each event to its socket.
//!
//! Thread-safe via an interior `RwLock`; designed to be wrapped in `Arc`
//! and shared across the application.

use std::collections::{HashMap, HashSet};

use linguist_core::topics::BROADCAST_ALL;
use tokio::sync::{mpsc, RwLock};

use crate::messages::JobEvent;

/// Channel sender half for pushing events to one connection.
pub type EventSender = mpsc::UnboundedSender<JobEvent>;

/// Channel receiver half handed to the transport.
pub type EventReceiver = mpsc::UnboundedReceiver<JobEvent>;

#[derive(Default)]
struct HubState {
    connections: HashMap<String, EventSender>,
    topics: HashMap<String, HashSet<String>>,
}

impl HubState {
    fn leave_all(&mut self, conn_id: &str) {
        self.topics.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
    }
}

/// Manages connections and their topic memberships.
#[derive(Default)]
pub struct TopicHub {
    state: RwLock<HubState>,
}

impl TopicHub {
    /// Create a new, empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and subscribe it to `broadcast:all`.
    ///
    /// Re-registering an existing id replaces its channel and drops its
    /// previous topic memberships.
    pub async fn connect(&self, conn_id: impl Into<String>) -> EventReceiver {
        let conn_id = conn_id.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.write().await;
        state.leave_all(&conn_id);
        state.connections.insert(conn_id.clone(), tx);
        state
            .topics
            .entry(BROADCAST_ALL.to_string())
            .or_default()
            .insert(conn_id);
        rx
    }

    /// Remove a connection and all of its topic memberships.
    pub async fn disconnect(&self, conn_id: &str) {
        let mut state = self.state.write().await;
        state.connections.remove(conn_id);
        state.leave_all(conn_id);
    }

    /// Subscribe a connection to a topic.
    ///
    /// Returns `false` if the connection is unknown. Joining twice is a
    /// no-op.
    pub async fn join(&self, conn_id: &str, topic: &str) -> bool {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(conn_id) {
            return false;
        }
        state
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(conn_id.to_string());
        true
    }

    /// Unsubscribe a connection from a topic.
    ///
    /// Returns `true` if the connection was a member.
    pub async fn leave(&self, conn_id: &str, topic: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(members) = state.topics.get_mut(topic) else {
            return false;
        };
        let removed = members.remove(conn_id);
        if members.is_empty() {
            state.topics.remove(topic);
        }
        removed
    }

    /// Send an event to every subscriber of `topic`.
    ///
    /// Returns the number of connections the event was delivered to.
    pub async fn publish(&self, topic: &str, event: JobEvent) -> usize {
        self.publish_many(&[topic], event).await
    }

    /// Send an event to the union of the subscribers of `topics`.
    ///
    /// A connection subscribed to several of the topics receives the event
    /// once. Closed channels are skipped; they are cleaned up when their
    /// transport disconnects.
    pub async fn publish_many(&self, topics: &[&str], event: JobEvent) -> usize {
        let state = self.state.read().await;

        let recipients: HashSet<&String> = topics
            .iter()
            .filter_map(|topic| state.topics.get(*topic))
            .flatten()
            .collect();

        let mut delivered = 0;
        for conn_id in recipients {
            let Some(sender) = state.connections.get(conn_id) else {
                continue;
            };
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(conn_id = %conn_id, "Dropping event for closed connection");
            }
        }
        delivered
    }

    /// Number of connections subscribed to `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .topics
            .get(topic)
            .map_or(0, HashSet::len)
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Drop every connection. Their receivers observe a closed channel,
    /// which the transport turns into a Close frame.
    pub async fn shutdown_all(&self) {
        let mut state = self.state.write().await;
        let count = state.connections.len();
        state.connections.clear();
        state.topics.clear();
        tracing::info!(count, "Closed all subscriber connections");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::JobCreated;
    use linguist_core::topics::worker_topic;

    fn created(job_id: i64) -> JobEvent {
        JobEvent::Created(JobCreated::new(job_id, "catalog"))
    }

    #[tokio::test]
    async fn connect_joins_broadcast_all() {
        let hub = TopicHub::new();
        let _rx = hub.connect("conn-1").await;

        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(hub.subscriber_count(BROADCAST_ALL).await, 1);
    }

    #[tokio::test]
    async fn publish_reaches_only_topic_members() {
        let hub = TopicHub::new();
        let mut rx1 = hub.connect("conn-1").await;
        let mut rx2 = hub.connect("conn-2").await;
        let topic = worker_topic("worker-1");

        assert!(hub.join("conn-1", &topic).await);
        assert_eq!(hub.publish(&topic, created(1)).await, 1);

        assert_eq!(rx1.recv().await.map(|e| e.job_id()), Some(1));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_many_delivers_once_per_connection() {
        let hub = TopicHub::new();
        let mut rx = hub.connect("conn-1").await;
        let topic = worker_topic("worker-1");
        hub.join("conn-1", &topic).await;

        let delivered = hub.publish_many(&[topic.as_str(), BROADCAST_ALL], created(3)).await;

        assert_eq!(delivered, 1);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_unknown_connection_fails() {
        let hub = TopicHub::new();
        assert!(!hub.join("ghost", "worker:worker-1").await);
        assert_eq!(hub.subscriber_count("worker:worker-1").await, 0);
    }

    #[tokio::test]
    async fn leave_stops_delivery_and_prunes_topic() {
        let hub = TopicHub::new();
        let mut rx = hub.connect("conn-1").await;
        let topic = worker_topic("worker-2");
        hub.join("conn-1", &topic).await;

        assert!(hub.leave("conn-1", &topic).await);
        assert!(!hub.leave("conn-1", &topic).await);
        assert_eq!(hub.subscriber_count(&topic).await, 0);

        assert_eq!(hub.publish(&topic, created(1)).await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_removes_all_memberships() {
        let hub = TopicHub::new();
        let _rx = hub.connect("conn-1").await;
        hub.join("conn-1", "worker:worker-1").await;

        hub.disconnect("conn-1").await;

        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(hub.subscriber_count(BROADCAST_ALL).await, 0);
        assert_eq!(hub.subscriber_count("worker:worker-1").await, 0);
    }

    #[tokio::test]
    async fn closed_receiver_is_skipped() {
        let hub = TopicHub::new();
        let rx1 = hub.connect("conn-1").await;
        let mut rx2 = hub.connect("conn-2").await;
        drop(rx1);

        assert_eq!(hub.publish(BROADCAST_ALL, created(5)).await, 1);
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn shutdown_all_closes_receivers() {
        let hub = TopicHub::new();
        let mut rx = hub.connect("conn-1").await;

        hub.shutdown_all().await;

        assert_eq!(hub.connection_count().await, 0);
        assert!(rx.recv().await.is_none());
    }
}
