use parking_lot::Mutex;
use std::sync::Arc;

use super::transaction::{ActionType, Transaction};
use crate::bully::types::NodeId;
use crate::events::EventBus;
use crate::storage::TransactionStorage;
use crate::util::errors::Result;
use crate::util::time::{now, Timestamp};

/// Append-only audit trail of this node.
///
/// A record is acknowledged only once the storage accepted it; every
/// accepted record pushes the latest `feed_len` entries on the bus.
pub struct TransactionLog {
    node_id: NodeId,
    feed_len: usize,
    bus: Arc<EventBus>,
    inner: Mutex<Inner>,
}

struct Inner {
    entries: Vec<Transaction>,
    next_id: u64,
    storage: Box<dyn TransactionStorage>,
}

impl TransactionLog {
    pub fn new(
        node_id: NodeId,
        storage: Box<dyn TransactionStorage>,
        bus: Arc<EventBus>,
        feed_len: usize,
    ) -> Result<Self> {
        let entries = storage.load_all()?;
        let next_id = entries.last().map(|t| t.id + 1).unwrap_or(1);

        Ok(Self {
            node_id,
            feed_len: feed_len.max(1),
            bus,
            inner: Mutex::new(Inner {
                entries,
                next_id,
                storage,
            }),
        })
    }

    /// Record an action performed by this node
    pub fn append(&self, action_type: ActionType, description: impl Into<String>) -> Result<Transaction> {
        self.append_from(self.node_id, action_type, description.into(), now())
    }

    /// Record an action performed by `node_id`, e.g. a booking replicated
    /// from the leader. The id is always assigned locally.
    pub fn append_from(
        &self,
        node_id: NodeId,
        action_type: ActionType,
        description: String,
        created_at: Timestamp,
    ) -> Result<Transaction> {
        let mut inner = self.inner.lock();

        let transaction = Transaction {
            id: inner.next_id,
            node_id,
            action_type,
            description,
            created_at,
        };

        inner.storage.append(&transaction)?;
        inner.next_id += 1;
        inner.entries.push(transaction.clone());

        tracing::debug!(
            "Transaction {} [{}] {}",
            transaction.id,
            transaction.action_type,
            transaction.description
        );

        let start = inner.entries.len().saturating_sub(self.feed_len);
        self.bus.publish_transactions(inner.entries[start..].to_vec());

        Ok(transaction)
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.inner.lock().entries.clone()
    }

    /// The `n` newest records, oldest first
    pub fn recent(&self, n: usize) -> Vec<Transaction> {
        let inner = self.inner.lock();
        let start = inner.entries.len().saturating_sub(n);
        inner.entries[start..].to_vec()
    }

    pub fn feed(&self) -> Vec<Transaction> {
        self.recent(self.feed_len)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
