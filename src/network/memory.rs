use actix::prelude::*;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::transport::PeerTransport;
use crate::bully::actor::{BullyActor, GetPing, HandleElection, HandleVictory};
use crate::bully::rpc::{ElectionReply, ElectionRequest, PingResponse, VictoryAck};
use crate::bully::types::NodeId;
use crate::ledger::actor::{ApplyReplicated, BookSeat, GetSeats, LedgerActor};
use crate::ledger::rpc::{BookSeatRequest, ReplicatedBooking};
use crate::ledger::seat::Seat;
use crate::registry::Node;
use crate::util::errors::{BullyError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Mailboxes of one in-process node
#[derive(Clone)]
pub struct MemoryPeer {
    pub bully: Addr<BullyActor>,
    pub ledger: Addr<LedgerActor>,
}

/// Routes peer calls straight to the actors of nodes living in the same
/// process. A node marked down neither sends nor receives.
#[derive(Default)]
pub struct MemoryNetwork {
    peers: RwLock<HashMap<NodeId, MemoryPeer>>,
    down: RwLock<HashSet<NodeId>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, node_id: NodeId, peer: MemoryPeer) {
        self.peers.write().insert(node_id, peer);
    }

    /// Cut the node off the network
    pub fn kill(&self, node_id: NodeId) {
        tracing::info!("Node {} is down", node_id);
        self.down.write().insert(node_id);
    }

    pub fn revive(&self, node_id: NodeId) {
        tracing::info!("Node {} is back up", node_id);
        self.down.write().remove(&node_id);
    }

    pub fn is_down(&self, node_id: NodeId) -> bool {
        self.down.read().contains(&node_id)
    }

    pub fn transport_for(self: &Arc<Self>, local_id: NodeId) -> MemoryTransport {
        MemoryTransport {
            local_id,
            network: self.clone(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct MemoryTransport {
    local_id: NodeId,
    network: Arc<MemoryNetwork>,
    timeout: Duration,
}

impl MemoryTransport {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn route(&self, peer: &Node) -> Result<MemoryPeer> {
        if self.network.is_down(self.local_id) || self.network.is_down(peer.id) {
            return Err(BullyError::NetworkUnreachable(format!(
                "node {} cannot reach node {}",
                self.local_id, peer.id
            )));
        }

        self.network
            .peers
            .read()
            .get(&peer.id)
            .cloned()
            .ok_or_else(|| BullyError::NetworkUnreachable(format!("node {} is not registered", peer.id)))
    }
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn ping(&self, peer: &Node) -> Result<PingResponse> {
        let route = self.route(peer)?;
        Ok(route.bully.send(GetPing).timeout(self.timeout).await?)
    }

    async fn send_election(&self, peer: &Node, request: ElectionRequest) -> Result<ElectionReply> {
        let route = self.route(peer)?;
        route
            .bully
            .send(HandleElection(request))
            .timeout(self.timeout)
            .await?
    }

    async fn send_victory(&self, peer: &Node, leader_id: NodeId) -> Result<VictoryAck> {
        let route = self.route(peer)?;
        route
            .bully
            .send(HandleVictory { leader_id })
            .timeout(self.timeout)
            .await?
    }

    async fn replicate_booking(&self, peer: &Node, booking: ReplicatedBooking) -> Result<()> {
        let route = self.route(peer)?;
        route
            .ledger
            .send(ApplyReplicated(booking))
            .timeout(self.timeout)
            .await??;
        Ok(())
    }

    async fn fetch_seats(&self, peer: &Node) -> Result<Vec<Seat>> {
        let route = self.route(peer)?;
        Ok(route.ledger.send(GetSeats).timeout(self.timeout).await?)
    }

    async fn forward_booking(&self, leader: &Node, request: BookSeatRequest) -> Result<Seat> {
        let route = self.route(leader)?;
        match route
            .ledger
            .send(BookSeat { request })
            .timeout(self.timeout)
            .await?
        {
            Err(BullyError::NotLeader(_)) => Err(BullyError::NoLeaderAvailable),
            other => other,
        }
    }
}
