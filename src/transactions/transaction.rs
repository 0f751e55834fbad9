use serde::{Deserialize, Serialize};

use crate::bully::types::NodeId;
use crate::util::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Heartbeat,
    Book,
    Lock,
    Log,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Heartbeat => write!(f, "HEARTBEAT"),
            ActionType::Book => write!(f, "BOOK"),
            ActionType::Lock => write!(f, "LOCK"),
            ActionType::Log => write!(f, "LOG"),
        }
    }
}

/// Immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    /// Node that performed the action
    pub node_id: NodeId,
    pub action_type: ActionType,
    pub description: String,
    pub created_at: Timestamp,
}
