use serde::{Deserialize, Serialize};

use super::state::Role;
use super::types::NodeId;

/// ELECTION - sent by a candidate to every higher node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ElectionRequest {
    pub sender_id: NodeId,
}

/// Answer to ELECTION; `ok` means "I am higher and alive, stand down"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionReply {
    pub ok: bool,
    pub responder_id: NodeId,
}

/// Answer to COORDINATOR; a lower receiver accepts, a higher one bullies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VictoryAck {
    pub accepted: bool,
    pub node_id: NodeId,
}

/// Liveness ping answer, also used for leader discovery at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub node_id: NodeId,
    pub role: Role,
    pub is_leader: bool,
    pub leader_id: Option<NodeId>,
}
