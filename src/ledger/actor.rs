use actix::prelude::*;
use futures::future::join_all;
use std::sync::Arc;

use super::rpc::{BookSeatRequest, ReplicatedBooking};
use super::seat::{normalize_seat_number, Seat};
use super::seat_ledger::SeatLedger;
use crate::bully::types::NodeId;
use crate::config::LedgerConfig;
use crate::events::EventBus;
use crate::network::PeerTransport;
use crate::registry::{AliveState, NodeRegistry};
use crate::storage::LedgerStorage;
use crate::transactions::{ActionType, TransactionLog};
use crate::util::errors::{BullyError, Result};

/// Book a seat on this node; only the leader commits
#[derive(Message)]
#[rtype(result = "Result<Seat>")]
pub struct BookSeat {
    pub request: BookSeatRequest,
}

#[derive(Message)]
#[rtype(result = "Vec<Seat>")]
pub struct GetSeats;

/// A booking the leader committed
#[derive(Message)]
#[rtype(result = "Result<Seat>")]
pub struct ApplyReplicated(pub ReplicatedBooking);

/// Pull the seat map of a newly accepted leader and merge it
#[derive(Message)]
#[rtype(result = "()")]
pub struct SyncFromLeader {
    pub leader_id: NodeId,
}

/// Pull and merge the seat maps of every live peer. A leader sells no seat
/// before its latest catch-up finished.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CatchUp;

/// Whether this node would commit a booking right now
#[derive(Message)]
#[rtype(result = "bool")]
pub struct AcceptsBookings;

/// Single writer of the seat ledger. The mailbox serializes bookings, so
/// two concurrent bookings of one seat give one success and one conflict.
pub struct LedgerActor {
    node_id: NodeId,
    ledger: SeatLedger,
    storage: Box<dyn LedgerStorage>,
    registry: Arc<NodeRegistry>,
    transport: Arc<dyn PeerTransport>,
    transactions: Arc<TransactionLog>,
    bus: Arc<EventBus>,
    caught_up: bool,
    catching_up: usize,
    /// Bumped whenever this node starts following someone
    epoch: u64,
}

impl Actor for LedgerActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "Ledger actor of node {} started with {} seats",
            self.node_id,
            self.ledger.seats().len()
        );
        self.bus.publish_seats(self.ledger.snapshot());
    }
}

impl LedgerActor {
    /// Restore the persisted seat map, or start from an empty grid
    pub fn new(
        config: &LedgerConfig,
        storage: Box<dyn LedgerStorage>,
        registry: Arc<NodeRegistry>,
        transport: Arc<dyn PeerTransport>,
        transactions: Arc<TransactionLog>,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        let ledger = match storage.load_seats()? {
            Some(seats) => SeatLedger::new(seats),
            None => SeatLedger::with_grid(config.rows, config.columns),
        };

        Ok(Self {
            node_id: registry.local_id(),
            ledger,
            storage,
            registry,
            transport,
            transactions,
            bus,
            caught_up: false,
            catching_up: 0,
            epoch: 0,
        })
    }

    fn open_for_bookings(&self) -> bool {
        self.caught_up && self.catching_up == 0
    }

    fn persist(&mut self) {
        if let Err(e) = self.storage.save_seats(self.ledger.seats()) {
            tracing::error!("Failed to persist seats: {}", e);
        }
    }

    fn book(&mut self, request: &BookSeatRequest) -> Result<(Seat, ReplicatedBooking)> {
        let seat_number = normalize_seat_number(&request.seat_id);
        let slot = self.ledger.validate(&seat_number, &request.customer_name)?;

        match self.registry.leader() {
            None => return Err(BullyError::NoLeaderAvailable),
            Some(leader) if leader != self.node_id => return Err(BullyError::NotLeader(leader)),
            Some(_) => {}
        }
        if !self.open_for_bookings() {
            tracing::debug!(
                "Node {} still merging peer seats, refusing {}",
                self.node_id,
                seat_number
            );
            return Err(BullyError::NoLeaderAvailable);
        }

        self.ledger.check_free(slot)?;
        let customer = request.customer_name.trim();

        self.transactions.append(
            ActionType::Lock,
            format!("Node {} locked Seat {}", self.node_id, seat_number),
        )?;
        let transaction = self.transactions.append(
            ActionType::Book,
            format!("Customer {} bought Seat {}", customer, seat_number),
        )?;

        let seat = self.ledger.commit(slot, customer, self.node_id, transaction.created_at);
        tracing::info!("Seat {} booked for {}", seat.seat_number, customer);

        Ok((
            seat.clone(),
            ReplicatedBooking { seat, transaction },
        ))
    }

    /// Merge a seat map fetched from `source`; conflicts are audited
    fn absorb(&mut self, seats: &[Seat], source: NodeId) {
        let report = self.ledger.merge(seats);

        for conflict in &report.conflicts {
            let description = conflict.describe();
            tracing::warn!("{}", description);
            if let Err(e) = self.transactions.append(ActionType::Log, description) {
                tracing::error!("Failed to record booking conflict: {}", e);
            }
        }

        if report.changed > 0 {
            tracing::info!("Merged {} seats from node {}", report.changed, source);
            self.persist();
            self.bus.publish_seats(self.ledger.snapshot());
        }
    }

    fn replicate(&self, booking: ReplicatedBooking, ctx: &mut Context<Self>) {
        let peers: Vec<_> = self
            .registry
            .peers()
            .into_iter()
            .filter(|p| p.alive_state != AliveState::Dead)
            .collect();

        if peers.is_empty() {
            return;
        }

        let transport = self.transport.clone();
        let seat_number = booking.seat.seat_number.clone();

        let calls = join_all(peers.into_iter().map(move |peer| {
            let transport = transport.clone();
            let booking = booking.clone();
            async move { (peer.id, transport.replicate_booking(&peer, booking).await) }
        }));

        ctx.spawn(calls.into_actor(self).map(move |results, _act, _ctx| {
            for (peer_id, result) in results {
                if let Err(e) = result {
                    tracing::warn!(
                        "Failed to replicate seat {} to node {}: {}",
                        seat_number,
                        peer_id,
                        e
                    );
                }
            }
        }));
    }
}

// Handler implementations

impl Handler<BookSeat> for LedgerActor {
    type Result = Result<Seat>;

    fn handle(&mut self, msg: BookSeat, ctx: &mut Context<Self>) -> Self::Result {
        let (seat, booking) = self.book(&msg.request)?;

        self.persist();
        self.bus.publish_seats(self.ledger.snapshot());
        self.replicate(booking, ctx);

        Ok(seat)
    }
}

impl Handler<GetSeats> for LedgerActor {
    type Result = Vec<Seat>;

    fn handle(&mut self, _msg: GetSeats, _ctx: &mut Context<Self>) -> Self::Result {
        self.ledger.snapshot()
    }
}

impl Handler<ApplyReplicated> for LedgerActor {
    type Result = Result<Seat>;

    fn handle(&mut self, msg: ApplyReplicated, _ctx: &mut Context<Self>) -> Self::Result {
        let ReplicatedBooking { seat, transaction } = msg.0;
        let leader = self.registry.leader();

        if leader == Some(self.node_id) {
            return Err(BullyError::InvalidRequest(format!(
                "node {} leads and does not take replicated bookings",
                self.node_id
            )));
        }

        // only the current leader writes
        let author = transaction.node_id;
        if leader != Some(author) || seat.booked_by_node_id != Some(author) {
            tracing::warn!(
                "Refusing seat {} pushed by node {} (leader: {:?})",
                seat.seat_number,
                author,
                leader
            );
            return Err(BullyError::InvalidRequest(format!(
                "node {} is not the leader of node {}",
                author, self.node_id
            )));
        }

        match self.ledger.apply_replicated(&seat) {
            Ok(true) => {
                self.transactions.append_from(
                    transaction.node_id,
                    transaction.action_type,
                    transaction.description,
                    transaction.created_at,
                )?;
                self.persist();
                self.bus.publish_seats(self.ledger.snapshot());
                tracing::debug!("Applied replicated booking of seat {}", seat.seat_number);
            }
            Ok(false) => {}
            Err(BullyError::SeatConflict(number)) => {
                let local = self
                    .ledger
                    .get(&number)
                    .and_then(|s| s.customer_name.clone())
                    .unwrap_or_default();
                let description = format!(
                    "Seat {} already booked for {}, refused {} from Node {}",
                    number,
                    local,
                    seat.customer_name.as_deref().unwrap_or("?"),
                    author
                );
                tracing::warn!("{}", description);
                self.transactions.append(ActionType::Log, description)?;
                return Err(BullyError::SeatConflict(number));
            }
            Err(e) => return Err(e),
        }

        self.ledger
            .get(&seat.seat_number)
            .cloned()
            .ok_or(BullyError::UnknownSeat(seat.seat_number))
    }
}

impl Handler<SyncFromLeader> for LedgerActor {
    type Result = ();

    fn handle(&mut self, msg: SyncFromLeader, ctx: &mut Context<Self>) -> Self::Result {
        if msg.leader_id == self.node_id {
            return;
        }
        self.caught_up = false;
        self.epoch += 1;

        let Some(leader) = self.registry.get(msg.leader_id) else {
            tracing::warn!("Cannot sync seats from unknown node {}", msg.leader_id);
            return;
        };

        let transport = self.transport.clone();
        ctx.spawn(
            async move { transport.fetch_seats(&leader).await }
                .into_actor(self)
                .map(move |result, act, _ctx| match result {
                    Ok(seats) => act.absorb(&seats, msg.leader_id),
                    Err(e) => tracing::warn!(
                        "Failed to fetch seats from leader {}: {}",
                        msg.leader_id,
                        e
                    ),
                }),
        );
    }
}

impl Handler<CatchUp> for LedgerActor {
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, _msg: CatchUp, _ctx: &mut Context<Self>) -> Self::Result {
        self.catching_up += 1;
        let epoch = self.epoch;

        let peers: Vec<_> = self
            .registry
            .peers()
            .into_iter()
            .filter(|p| p.alive_state != AliveState::Dead)
            .collect();
        tracing::info!("Node {} catching up with {} peers", self.node_id, peers.len());

        let transport = self.transport.clone();
        let fetches = join_all(peers.into_iter().map(move |peer| {
            let transport = transport.clone();
            async move { (peer.id, transport.fetch_seats(&peer).await) }
        }));

        Box::pin(fetches.into_actor(self).map(move |results, act, _ctx| {
            for (peer_id, result) in results {
                match result {
                    Ok(seats) => act.absorb(&seats, peer_id),
                    Err(e) => tracing::debug!("No seats from node {}: {}", peer_id, e),
                }
            }

            act.catching_up = act.catching_up.saturating_sub(1);
            if act.epoch == epoch {
                act.caught_up = true;
            }
            if act.open_for_bookings() {
                tracing::info!("Node {} caught up, bookings open", act.node_id);
            }
        }))
    }
}

impl Handler<AcceptsBookings> for LedgerActor {
    type Result = bool;

    fn handle(&mut self, _msg: AcceptsBookings, _ctx: &mut Context<Self>) -> Self::Result {
        self.registry.leader() == Some(self.node_id) && self.open_for_bookings()
    }
}

/// Book on this node, handing a `NotLeader` over to the leader once.
/// A request that was already forwarded is never forwarded again.
pub async fn book_or_forward(
    ledger: &Addr<LedgerActor>,
    registry: &NodeRegistry,
    transport: &dyn PeerTransport,
    request: BookSeatRequest,
    forwarded: bool,
) -> Result<Seat> {
    let result = ledger
        .send(BookSeat {
            request: request.clone(),
        })
        .await?;

    match result {
        Err(BullyError::NotLeader(leader_id)) if !forwarded => {
            let leader = registry
                .get(leader_id)
                .ok_or(BullyError::NoLeaderAvailable)?;
            transport.forward_booking(&leader, request).await
        }
        Err(BullyError::NotLeader(_)) => Err(BullyError::NoLeaderAvailable),
        other => other,
    }
}
