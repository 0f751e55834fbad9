use serde::{Deserialize, Serialize};

use crate::util::time::Timestamp;

/// Node identifier, unique and totally ordered across the cluster
pub type NodeId = u64;

/// Election round counter, local to one node
pub type Round = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionEventType {
    /// Node answered a lower node's ELECTION and runs its own round
    Candidate,
    /// Node sent ELECTION to every higher node
    SentElection,
    /// Node won and announced itself as coordinator
    Winner,
    /// Node got an OK and steps back, waiting for the coordinator
    Participating,
}

impl ElectionEventType {
    pub fn describe(&self, node_id: NodeId) -> String {
        match self {
            ElectionEventType::Candidate => format!("Node {} is a candidate for leadership", node_id),
            ElectionEventType::SentElection => {
                format!("Node {} sends election message (ID: {})", node_id, node_id)
            }
            ElectionEventType::Winner => {
                format!("Node {} wins the election and becomes leader", node_id)
            }
            ElectionEventType::Participating => format!("Node {} participates in election", node_id),
        }
    }
}

impl std::fmt::Display for ElectionEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionEventType::Candidate => write!(f, "CANDIDATE"),
            ElectionEventType::SentElection => write!(f, "SENT_ELECTION"),
            ElectionEventType::Winner => write!(f, "WINNER"),
            ElectionEventType::Participating => write!(f, "PARTICIPATING"),
        }
    }
}

/// Observable trace of an election run. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionEvent {
    /// Assigned by the history when the event is accepted
    pub id: u64,
    pub node_id: NodeId,
    pub event_type: ElectionEventType,
    pub message: String,
    pub timestamp: Timestamp,
    pub sender_id: Option<NodeId>,
    pub leader_id: Option<NodeId>,
}

impl ElectionEvent {
    pub fn new(node_id: NodeId, event_type: ElectionEventType, timestamp: Timestamp) -> Self {
        Self {
            id: 0,
            node_id,
            event_type,
            message: event_type.describe(node_id),
            timestamp,
            sender_id: None,
            leader_id: None,
        }
    }

    pub fn with_sender(mut self, sender_id: NodeId) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    pub fn with_leader(mut self, leader_id: NodeId) -> Self {
        self.leader_id = Some(leader_id);
        self
    }
}
