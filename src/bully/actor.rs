use actix::prelude::*;
use futures::future::join_all;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::election::{
    coordinator_timed_out, discovered_leader, handle_coordinator, handle_election_replies,
    handle_election_request, handle_leader_claim, ClaimAction, CoordinatorOutcome, RoundOutcome,
};
use super::history::ElectionLog;
use super::rpc::{ElectionReply, ElectionRequest, PingResponse, VictoryAck};
use super::state::{ElectionState, Role};
use super::types::{ElectionEvent, ElectionEventType, NodeId, Round};
use crate::config::ElectionConfig;
use crate::events::EventBus;
use crate::ledger::actor::{CatchUp, LedgerActor, SyncFromLeader};
use crate::network::PeerTransport;
use crate::registry::NodeRegistry;
use crate::transactions::{ActionType, TransactionLog};
use crate::util::errors::{BullyError, Result};
use crate::util::time::now;

/// Run the startup discovery (after the configured delay)
#[derive(Message)]
#[rtype(result = "()")]
pub struct Initialize;

/// The failure detector declared the current leader dead
#[derive(Message)]
#[rtype(result = "()")]
pub struct LeaderFailed {
    pub leader_id: NodeId,
}

/// A ping showed a peer acting as leader that is not ours
#[derive(Message)]
#[rtype(result = "()")]
pub struct LeaderClaim {
    pub leader_id: NodeId,
}

/// Incoming ELECTION from a lower node
#[derive(Message)]
#[rtype(result = "Result<ElectionReply>")]
pub struct HandleElection(pub ElectionRequest);

/// Incoming COORDINATOR
#[derive(Message)]
#[rtype(result = "Result<VictoryAck>")]
pub struct HandleVictory {
    pub leader_id: NodeId,
}

#[derive(Message)]
#[rtype(result = "PingResponse")]
pub struct GetPing;

/// Get current election state (for monitoring)
#[derive(Message)]
#[rtype(result = "ElectionStateInfo")]
pub struct GetElectionState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStateInfo {
    pub node_id: NodeId,
    pub role: Role,
    pub leader_id: Option<NodeId>,
    pub round: Round,
}

macro_rules! message_response {
    ($($ty:ty),*) => {
        $(
            impl<A, M> actix::dev::MessageResponse<A, M> for $ty
            where
                A: Actor,
                M: Message<Result = $ty>,
            {
                fn handle(self, _ctx: &mut A::Context, tx: Option<actix::dev::OneshotSender<M::Result>>) {
                    if let Some(tx) = tx {
                        let _ = tx.send(self);
                    }
                }
            }
        )*
    };
}

message_response!(ElectionStateInfo, PingResponse);

/// Runs the Bully protocol for one node.
///
/// All state changes happen inside the actor; outgoing calls are spawned
/// futures that report back with the round they were started in, so a
/// completion from a superseded round is simply ignored.
pub struct BullyActor {
    state: ElectionState,
    config: ElectionConfig,
    registry: Arc<NodeRegistry>,
    transport: Arc<dyn PeerTransport>,
    history: Arc<ElectionLog>,
    bus: Arc<EventBus>,
    transactions: Arc<TransactionLog>,
    ledger: Addr<LedgerActor>,
    coordinator_timeout_handle: Option<SpawnHandle>,
}

impl Actor for BullyActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Election actor of node {} started", self.state.node_id);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Election actor of node {} stopped", self.state.node_id);
    }
}

impl BullyActor {
    pub fn new(
        config: ElectionConfig,
        registry: Arc<NodeRegistry>,
        transport: Arc<dyn PeerTransport>,
        history: Arc<ElectionLog>,
        bus: Arc<EventBus>,
        transactions: Arc<TransactionLog>,
        ledger: Addr<LedgerActor>,
    ) -> Self {
        Self {
            state: ElectionState::new(registry.local_id()),
            config,
            registry,
            transport,
            history,
            bus,
            transactions,
            ledger,
            coordinator_timeout_handle: None,
        }
    }

    fn node_id(&self) -> NodeId {
        self.state.node_id
    }

    fn emit(&self, event: ElectionEvent) {
        if let Some(event) = self.history.record(event) {
            tracing::info!("Election event: {}", event.message);
            self.bus.publish_election(event, self.history.snapshot());
        }
    }

    fn audit(&self, description: String) {
        if let Err(e) = self.transactions.append(ActionType::Log, description) {
            tracing::error!("Failed to record transaction: {}", e);
        }
    }

    fn cancel_coordinator_timeout(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.coordinator_timeout_handle.take() {
            ctx.cancel_future(handle);
        }
    }

    /// Ask every peer who leads; follow a higher leader or run an election
    fn discover(&mut self, ctx: &mut Context<Self>) {
        let peers = self.registry.peers();
        let transport = self.transport.clone();
        let timeout = self.config.election_timeout();

        tracing::info!(
            "Node {} probing {} peers for a leader",
            self.node_id(),
            peers.len()
        );

        let pings = join_all(peers.into_iter().map(move |peer| {
            let transport = transport.clone();
            async move {
                match tokio::time::timeout(timeout, transport.ping(&peer)).await {
                    Ok(Ok(ping)) => Some(ping),
                    _ => None,
                }
            }
        }));

        ctx.spawn(pings.into_actor(self).map(|pings, act, ctx| {
            // something else already moved us on
            if act.state.role != Role::Idle {
                return;
            }

            match discovered_leader(&act.state, &pings) {
                Some(leader_id) => {
                    tracing::info!("Node {} found leader {} at startup", act.node_id(), leader_id);
                    act.accept_coordinator(leader_id, ctx);
                }
                None => act.start_election(ctx),
            }
        }));
    }

    fn start_election(&mut self, ctx: &mut Context<Self>) {
        self.cancel_coordinator_timeout(ctx);

        let round = self.state.begin_election();
        self.registry.clear_leader();
        self.bus.publish_nodes(&self.registry);
        self.emit(ElectionEvent::new(
            self.node_id(),
            ElectionEventType::SentElection,
            now(),
        ));

        let higher = self.registry.higher_than(self.node_id());
        self.state.await_ok();

        if higher.is_empty() {
            self.finish_round(round, Vec::new(), ctx);
            return;
        }

        let transport = self.transport.clone();
        let timeout = self.config.election_timeout();
        let request = ElectionRequest {
            sender_id: self.node_id(),
        };

        let replies = join_all(higher.into_iter().map(move |peer| {
            let transport = transport.clone();
            let request = request.clone();
            async move {
                match tokio::time::timeout(timeout, transport.send_election(&peer, request)).await {
                    Ok(Ok(reply)) => Some(reply),
                    Ok(Err(e)) => {
                        tracing::debug!("ELECTION to {} failed: {}", peer.id, e);
                        None
                    }
                    Err(_) => {
                        tracing::debug!("ELECTION to {} timed out", peer.id);
                        None
                    }
                }
            }
        }));

        ctx.spawn(
            replies
                .into_actor(self)
                .map(move |replies, act, ctx| act.finish_round(round, replies, ctx)),
        );
    }

    fn finish_round(&mut self, round: Round, replies: Vec<Option<ElectionReply>>, ctx: &mut Context<Self>) {
        match handle_election_replies(&mut self.state, round, &replies) {
            RoundOutcome::Stale => {}
            RoundOutcome::Won => self.announce_victory(ctx),
            RoundOutcome::SteppedBack => {
                let bully = replies
                    .iter()
                    .flatten()
                    .filter(|r| r.ok)
                    .map(|r| r.responder_id)
                    .max();

                let mut event = ElectionEvent::new(
                    self.node_id(),
                    ElectionEventType::Participating,
                    now(),
                );
                if let Some(bully) = bully {
                    event = event.with_sender(bully);
                }
                self.emit(event);

                self.arm_coordinator_timeout(round, ctx);
            }
        }
    }

    fn arm_coordinator_timeout(&mut self, round: Round, ctx: &mut Context<Self>) {
        self.cancel_coordinator_timeout(ctx);

        let handle = ctx.run_later(self.config.coordinator_timeout(), move |act, ctx| {
            act.coordinator_timeout_handle = None;
            if coordinator_timed_out(&act.state, round) {
                tracing::info!(
                    "Node {} got no coordinator for round {}, restarting election",
                    act.node_id(),
                    round
                );
                act.start_election(ctx);
            }
        });

        self.coordinator_timeout_handle = Some(handle);
    }

    fn announce_victory(&mut self, ctx: &mut Context<Self>) {
        let node_id = self.node_id();
        self.cancel_coordinator_timeout(ctx);

        // queued ahead of any booking that could see the new leader
        self.ledger.do_send(CatchUp);

        if let Err(e) = self.registry.set_leader(node_id) {
            tracing::error!("Failed to record leadership: {}", e);
        }
        self.bus.publish_nodes(&self.registry);
        self.emit(ElectionEvent::new(node_id, ElectionEventType::Winner, now()).with_leader(node_id));
        self.audit(format!("Node {} is now the leader", node_id));

        let peers = self.registry.peers();
        let transport = self.transport.clone();

        let acks = join_all(peers.into_iter().map(move |peer| {
            let transport = transport.clone();
            async move { (peer.id, transport.send_victory(&peer, node_id).await) }
        }));

        ctx.spawn(acks.into_actor(self).map(|acks, act, _ctx| {
            for (peer_id, ack) in acks {
                match ack {
                    Ok(ack) if !ack.accepted => tracing::info!(
                        "Node {} refused coordinator {}, expecting an election",
                        peer_id,
                        act.node_id()
                    ),
                    Ok(_) => {}
                    Err(e) => tracing::debug!("COORDINATOR to {} failed: {}", peer_id, e),
                }
            }
        }));
    }

    fn reannounce_to(&self, peer_id: NodeId, ctx: &mut Context<Self>) {
        let Some(peer) = self.registry.get(peer_id) else {
            return;
        };
        let transport = self.transport.clone();
        let node_id = self.node_id();

        ctx.spawn(
            async move { transport.send_victory(&peer, node_id).await }
                .into_actor(self)
                .map(move |result, _act, _ctx| {
                    if let Err(e) = result {
                        tracing::debug!("COORDINATOR to {} failed: {}", peer_id, e);
                    }
                }),
        );
    }

    /// Apply COORDINATOR(leader_id); returns whether it was accepted
    fn accept_coordinator(&mut self, leader_id: NodeId, ctx: &mut Context<Self>) -> bool {
        match handle_coordinator(&mut self.state, leader_id) {
            CoordinatorOutcome::Accepted { yielded, changed } => {
                self.cancel_coordinator_timeout(ctx);

                if !changed && !yielded {
                    return true;
                }

                if let Err(e) = self.registry.set_leader(leader_id) {
                    tracing::error!("Failed to record leader {}: {}", leader_id, e);
                }
                self.bus.publish_nodes(&self.registry);
                self.audit(format!(
                    "Node {} acknowledges Node {} as leader",
                    self.node_id(),
                    leader_id
                ));
                self.ledger.do_send(SyncFromLeader { leader_id });
                true
            }
            CoordinatorOutcome::Rejected => {
                if self.state.is_leader() {
                    self.reannounce_to(leader_id, ctx);
                } else {
                    self.start_election(ctx);
                }
                false
            }
        }
    }
}

// Handler implementations

impl Handler<Initialize> for BullyActor {
    type Result = ();

    fn handle(&mut self, _msg: Initialize, ctx: &mut Context<Self>) -> Self::Result {
        let jitter = match self.config.startup_jitter_ms {
            0 => 0,
            max => rand::thread_rng().gen_range(0..=max),
        };
        let delay = self.config.startup_delay() + Duration::from_millis(jitter);

        tracing::debug!("Node {} starts discovery in {:?}", self.node_id(), delay);

        ctx.run_later(delay, |act, ctx| act.discover(ctx));
    }
}

impl Handler<LeaderFailed> for BullyActor {
    type Result = ();

    fn handle(&mut self, msg: LeaderFailed, ctx: &mut Context<Self>) -> Self::Result {
        if self.state.leader != Some(msg.leader_id) || self.state.is_electing() {
            tracing::debug!(
                "Node {} ignoring failure of {} (leader: {:?}, role: {})",
                self.node_id(),
                msg.leader_id,
                self.state.leader,
                self.state.role
            );
            return;
        }

        tracing::info!(
            "Node {} detected leader {} failure, starting election",
            self.node_id(),
            msg.leader_id
        );
        self.start_election(ctx);
    }
}

impl Handler<LeaderClaim> for BullyActor {
    type Result = ();

    fn handle(&mut self, msg: LeaderClaim, ctx: &mut Context<Self>) -> Self::Result {
        match handle_leader_claim(&self.state, msg.leader_id) {
            ClaimAction::Ignore => {}
            ClaimAction::Follow => {
                tracing::info!(
                    "Node {} found higher leader {}",
                    self.node_id(),
                    msg.leader_id
                );
                self.accept_coordinator(msg.leader_id, ctx);
            }
            ClaimAction::Reannounce => {
                tracing::info!(
                    "Node {} reminds {} who leads",
                    self.node_id(),
                    msg.leader_id
                );
                self.reannounce_to(msg.leader_id, ctx);
            }
            ClaimAction::StartRound => {
                tracing::info!(
                    "Node {} outranks claimed leader {}, starting election",
                    self.node_id(),
                    msg.leader_id
                );
                self.start_election(ctx);
            }
        }
    }
}

impl Handler<HandleElection> for BullyActor {
    type Result = Result<ElectionReply>;

    fn handle(&mut self, msg: HandleElection, ctx: &mut Context<Self>) -> Self::Result {
        let request = msg.0;
        if !self.registry.contains(request.sender_id) {
            return Err(BullyError::UnknownNode(request.sender_id));
        }

        let decision = handle_election_request(&self.state, &request);

        if decision.reannounce {
            self.reannounce_to(request.sender_id, ctx);
        }

        if decision.start_round {
            self.emit(
                ElectionEvent::new(self.node_id(), ElectionEventType::Candidate, now())
                    .with_sender(request.sender_id),
            );
            self.start_election(ctx);
        }

        Ok(decision.reply)
    }
}

impl Handler<HandleVictory> for BullyActor {
    type Result = Result<VictoryAck>;

    fn handle(&mut self, msg: HandleVictory, ctx: &mut Context<Self>) -> Self::Result {
        if !self.registry.contains(msg.leader_id) {
            return Err(BullyError::UnknownNode(msg.leader_id));
        }

        tracing::debug!("Node {} received COORDINATOR({})", self.node_id(), msg.leader_id);

        let accepted = self.accept_coordinator(msg.leader_id, ctx);
        Ok(VictoryAck {
            accepted,
            node_id: self.node_id(),
        })
    }
}

impl Handler<GetPing> for BullyActor {
    type Result = PingResponse;

    fn handle(&mut self, _msg: GetPing, _ctx: &mut Context<Self>) -> Self::Result {
        PingResponse {
            node_id: self.node_id(),
            role: self.state.role,
            is_leader: self.state.is_leader(),
            leader_id: self.state.leader,
        }
    }
}

impl Handler<GetElectionState> for BullyActor {
    type Result = ElectionStateInfo;

    fn handle(&mut self, _msg: GetElectionState, _ctx: &mut Context<Self>) -> Self::Result {
        ElectionStateInfo {
            node_id: self.node_id(),
            role: self.state.role,
            leader_id: self.state.leader,
            round: self.state.round,
        }
    }
}
