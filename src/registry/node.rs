use serde::{Deserialize, Serialize};

use crate::bully::types::NodeId;
use crate::util::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AliveState {
    Alive,
    /// Missed at least one ping, not yet declared dead
    Suspected,
    Dead,
}

impl std::fmt::Display for AliveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AliveState::Alive => write!(f, "ALIVE"),
            AliveState::Suspected => write!(f, "SUSPECTED"),
            AliveState::Dead => write!(f, "DEAD"),
        }
    }
}

/// A cluster member as seen by the local node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// host:port of the node's HTTP API
    pub address: String,
    pub alive_state: AliveState,
    pub is_leader: bool,
    pub last_heartbeat_at: Option<Timestamp>,
}

impl Node {
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            alive_state: AliveState::Suspected,
            is_leader: false,
            last_heartbeat_at: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive_state != AliveState::Dead
    }
}

/// JSON shape served by `GET /node` and pushed as `nodeUpdate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: NodeId,
    pub address: String,
    pub is_alive: bool,
    pub alive_state: AliveState,
    pub is_leader: bool,
    /// RFC 3339, empty when the node was never heard from
    pub last_heartbeat: String,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            address: node.address.clone(),
            is_alive: node.is_alive(),
            alive_state: node.alive_state,
            is_leader: node.is_leader,
            last_heartbeat: node
                .last_heartbeat_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}
