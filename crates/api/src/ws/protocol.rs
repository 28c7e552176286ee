//! Client -> server frames.
//!
//! ```json
//! {"action": "join",  "worker_id": "worker-1"}
//! {"action": "leave", "worker_id": "worker-1"}
//! ```

use linguist_core::topics::worker_topic;
use linguist_core::types::WorkerId;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Start receiving events for a worker.
    Join { worker_id: WorkerId },
    /// Stop receiving events for a worker.
    Leave { worker_id: WorkerId },
}

impl ClientCommand {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Topic the command applies to.
    pub fn topic(&self) -> String {
        match self {
            ClientCommand::Join { worker_id } | ClientCommand::Leave { worker_id } => {
                worker_topic(worker_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_and_leave() {
        assert_eq!(
            ClientCommand::parse(r#"{"action":"join","worker_id":"worker-1"}"#).unwrap(),
            ClientCommand::Join {
                worker_id: "worker-1".into()
            }
        );
        let leave = ClientCommand::parse(r#"{"action":"leave","worker_id":"worker-2"}"#).unwrap();
        assert_eq!(leave.topic(), "worker:worker-2");
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(ClientCommand::parse(r#"{"action":"subscribe","worker_id":"worker-1"}"#).is_err());
    }

    #[test]
    fn rejects_missing_worker_id() {
        assert!(ClientCommand::parse(r#"{"action":"join"}"#).is_err());
    }
}
