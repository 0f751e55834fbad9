use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::bully::types::ElectionEvent;
use crate::ledger::seat::Seat;
use crate::registry::{NodeRegistry, NodeView};
use crate::transactions::Transaction;

/// Event streams a dashboard can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    NodeUpdate,
    SeatUpdate,
    TransactionUpdate,
    AdminUpdate,
    Election,
    ElectionUpdate,
}

impl Topic {
    /// Event name on the socket channel
    pub fn name(&self) -> &'static str {
        match self {
            Topic::NodeUpdate => "nodeUpdate",
            Topic::SeatUpdate => "seatUpdate",
            Topic::TransactionUpdate => "transactionUpdate",
            Topic::AdminUpdate => "adminUpdate",
            Topic::Election => "election",
            Topic::ElectionUpdate => "electionUpdate",
        }
    }
}

/// Seats, nodes and transactions pushed together
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminUpdate {
    pub seats: Vec<Seat>,
    pub nodes: Vec<NodeView>,
    pub transactions: Vec<Transaction>,
}

/// One stream. Sending never waits on subscribers.
pub struct Channel<T> {
    topic: Topic,
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Channel<T> {
    fn new(topic: Topic, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { topic, tx }
    }

    /// Returns the number of subscribers the value was queued for
    pub fn publish(&self, value: T) -> usize {
        self.tx.send(value).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            topic: self.topic,
            rx: self.tx.subscribe(),
            dropped: 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a stream. A subscriber that falls more than the
/// channel capacity behind loses the oldest values and carries on.
pub struct Subscription<T> {
    topic: Topic,
    rx: broadcast::Receiver<T>,
    dropped: u64,
}

impl<T: Clone> Subscription<T> {
    /// Next value, or None once the bus is gone
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(n)) => self.lagged(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next value if one is already queued
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(n)) => self.lagged(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Values lost to overflow so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn lagged(&mut self, n: u64) {
        self.dropped += n;
        tracing::warn!(
            "Subscriber of {} lagged behind, dropped {} oldest events",
            self.topic.name(),
            n
        );
    }
}

pub struct EventBus {
    pub nodes: Channel<Vec<NodeView>>,
    pub seats: Channel<Vec<Seat>>,
    pub transactions: Channel<Vec<Transaction>>,
    pub admin: Channel<AdminUpdate>,
    pub election: Channel<ElectionEvent>,
    pub election_history: Channel<Vec<ElectionEvent>>,
    // last state of the three admin streams; held while publishing so each
    // stream stays ordered even with several producers
    last: Mutex<AdminUpdate>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: Channel::new(Topic::NodeUpdate, capacity),
            seats: Channel::new(Topic::SeatUpdate, capacity),
            transactions: Channel::new(Topic::TransactionUpdate, capacity),
            admin: Channel::new(Topic::AdminUpdate, capacity),
            election: Channel::new(Topic::Election, capacity),
            election_history: Channel::new(Topic::ElectionUpdate, capacity),
            last: Mutex::new(AdminUpdate::default()),
        }
    }

    /// Publish the registry's current snapshot
    pub fn publish_nodes(&self, registry: &NodeRegistry) {
        let mut last = self.last.lock();
        let views = registry.views();
        last.nodes = views.clone();
        self.nodes.publish(views);
        self.admin.publish(last.clone());
    }

    pub fn publish_seats(&self, seats: Vec<Seat>) {
        let mut last = self.last.lock();
        last.seats = seats.clone();
        self.seats.publish(seats);
        self.admin.publish(last.clone());
    }

    pub fn publish_transactions(&self, transactions: Vec<Transaction>) {
        let mut last = self.last.lock();
        last.transactions = transactions.clone();
        self.transactions.publish(transactions);
        self.admin.publish(last.clone());
    }

    pub fn publish_election(&self, event: ElectionEvent, history: Vec<ElectionEvent>) {
        self.election.publish(event);
        self.election_history.publish(history);
    }

    /// Last known seats, nodes and transactions
    pub fn admin_snapshot(&self) -> AdminUpdate {
        self.last.lock().clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
