use actix::prelude::*;
use futures::future::join_all;
use std::sync::Arc;

use super::liveness::{LivenessTracker, Transition};
use crate::bully::actor::{LeaderClaim, LeaderFailed};
use crate::bully::rpc::PingResponse;
use crate::bully::types::NodeId;
use crate::config::DetectorConfig;
use crate::events::EventBus;
use crate::ledger::actor::CatchUp;
use crate::network::PeerTransport;
use crate::registry::{AliveState, NodeRegistry};
use crate::transactions::{ActionType, TransactionLog};
use crate::util::time::now;

/// Run one ping round right away
#[derive(Message)]
#[rtype(result = "()")]
pub struct PingRound;

/// Where the detector reports what it saw
pub struct Listeners {
    /// The registry's leader went dead
    pub leader_failed: Recipient<LeaderFailed>,
    /// A peer answered as leader while another one is recorded
    pub leader_claim: Recipient<LeaderClaim>,
    /// A dead peer answered again while this node leads
    pub peer_back: Recipient<CatchUp>,
}

/// Periodically pings every peer and keeps the registry's liveness view
/// current. Ping rounds never overlap; a slow peer only delays its own
/// verdict until the ping timeout.
pub struct FailureDetector {
    node_id: NodeId,
    config: DetectorConfig,
    registry: Arc<NodeRegistry>,
    transport: Arc<dyn PeerTransport>,
    bus: Arc<EventBus>,
    transactions: Arc<TransactionLog>,
    listeners: Listeners,
    tracker: LivenessTracker,
    probing: bool,
    rounds: u64,
}

impl Actor for FailureDetector {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "Failure detector of node {} started (interval: {:?})",
            self.node_id,
            self.config.ping_interval()
        );

        ctx.run_interval(self.config.ping_interval(), |act, ctx| {
            act.ping_round(ctx);
        });
    }
}

impl FailureDetector {
    pub fn new(
        config: DetectorConfig,
        registry: Arc<NodeRegistry>,
        transport: Arc<dyn PeerTransport>,
        bus: Arc<EventBus>,
        transactions: Arc<TransactionLog>,
        listeners: Listeners,
    ) -> Self {
        let node_id = registry.local_id();
        let tracker = LivenessTracker::new(
            config.dead_after_misses,
            registry.peers().iter().map(|p| p.id),
        );

        Self {
            node_id,
            config,
            registry,
            transport,
            bus,
            transactions,
            listeners,
            tracker,
            probing: false,
            rounds: 0,
        }
    }

    fn ping_round(&mut self, ctx: &mut Context<Self>) {
        if self.probing {
            tracing::debug!("Node {} skipping ping, previous round still running", self.node_id);
            return;
        }
        self.probing = true;
        self.rounds += 1;
        self.audit_heartbeat();

        let peers = self.registry.peers();
        let transport = self.transport.clone();
        let timeout = self.config.ping_timeout();

        let pings = join_all(peers.into_iter().map(move |peer| {
            let transport = transport.clone();
            async move {
                let ping = match tokio::time::timeout(timeout, transport.ping(&peer)).await {
                    Ok(Ok(ping)) => Some(ping),
                    _ => None,
                };
                (peer.id, ping)
            }
        }));

        ctx.spawn(pings.into_actor(self).map(|results, act, _ctx| {
            act.probing = false;
            for (peer_id, ping) in results {
                act.apply(peer_id, ping);
            }
        }));
    }

    fn audit_heartbeat(&self) {
        let every = self.config.heartbeat_audit_rounds;
        if every == 0 || self.rounds % every != 0 || self.registry.leader() != Some(self.node_id) {
            return;
        }

        if let Err(e) = self.transactions.append(
            ActionType::Heartbeat,
            format!("Leader Node {} sent heartbeat", self.node_id),
        ) {
            tracing::error!("Failed to record heartbeat: {}", e);
        }
    }

    fn apply(&mut self, peer_id: NodeId, ping: Option<PingResponse>) {
        let transition = match &ping {
            Some(_) => {
                if let Err(e) = self.registry.record_heartbeat(peer_id, now()) {
                    tracing::warn!("Heartbeat of unknown node: {}", e);
                }
                self.tracker.record_success(peer_id)
            }
            None => self.tracker.record_miss(peer_id),
        };

        if let Some(transition) = transition {
            self.report(transition);
        }

        // a second leader, e.g. a partitioned one that came back
        if let Some(ping) = ping {
            if ping.is_leader && self.registry.leader() != Some(peer_id) {
                self.listeners.leader_claim.do_send(LeaderClaim { leader_id: peer_id });
            }
        }
    }

    fn report(&mut self, transition: Transition) {
        let Transition { node_id, from, to } = transition;
        tracing::info!("Node {} is now {} (was {})", node_id, to, from);

        // read before the update; a dead leader keeps its flag until a new round
        let leader = self.registry.leader();

        if let Err(e) = self.registry.set_alive_state(node_id, to) {
            tracing::warn!("Failed to update liveness: {}", e);
            return;
        }
        self.bus.publish_nodes(&self.registry);

        if let Err(e) = self
            .transactions
            .append(ActionType::Log, format!("Node {} is now {}", node_id, to))
        {
            tracing::error!("Failed to record liveness change: {}", e);
        }

        if to == AliveState::Dead && leader == Some(node_id) {
            tracing::info!("Leader {} is dead, notifying election", node_id);
            self.listeners
                .leader_failed
                .do_send(LeaderFailed { leader_id: node_id });
        }

        // it may have sold seats while we could not see each other
        if from == AliveState::Dead && to == AliveState::Alive && leader == Some(self.node_id) {
            tracing::info!("Node {} is back, merging its seats", node_id);
            self.listeners.peer_back.do_send(CatchUp);
        }
    }
}

impl Handler<PingRound> for FailureDetector {
    type Result = ();

    fn handle(&mut self, _msg: PingRound, ctx: &mut Context<Self>) -> Self::Result {
        self.ping_round(ctx);
    }
}
