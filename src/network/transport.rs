use async_trait::async_trait;

use crate::bully::rpc::{ElectionReply, ElectionRequest, PingResponse, VictoryAck};
use crate::bully::types::NodeId;
use crate::ledger::rpc::{BookSeatRequest, ReplicatedBooking};
use crate::ledger::seat::Seat;
use crate::registry::Node;
use crate::util::errors::Result;

/// Calls one node makes on its peers. Every call is bounded by the
/// implementation's timeout and folds transport failures into
/// `NetworkUnreachable` / `Timeout` / `MalformedMessage`.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Liveness ping
    async fn ping(&self, peer: &Node) -> Result<PingResponse>;

    /// ELECTION
    async fn send_election(&self, peer: &Node, request: ElectionRequest) -> Result<ElectionReply>;

    /// COORDINATOR
    async fn send_victory(&self, peer: &Node, leader_id: NodeId) -> Result<VictoryAck>;

    async fn replicate_booking(&self, peer: &Node, booking: ReplicatedBooking) -> Result<()>;

    async fn fetch_seats(&self, peer: &Node) -> Result<Vec<Seat>>;

    /// Hand a booking to the leader; never forwarded again from there
    async fn forward_booking(&self, leader: &Node, request: BookSeatRequest) -> Result<Seat>;
}
