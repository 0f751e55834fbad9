use parking_lot::RwLock;
use std::sync::Arc;

use super::node::{AliveState, Node, NodeView};
use crate::bully::types::NodeId;
use crate::config::NodeInfo;
use crate::util::errors::{BullyError, Result};
use crate::util::time::Timestamp;

/// Cluster membership, liveness and leader flag.
///
/// Readers get an immutable snapshot; every write builds the next snapshot
/// under the write lock and swaps it in, so no reader ever observes a
/// half-applied `set_leader`.
pub struct NodeRegistry {
    local_id: NodeId,
    nodes: RwLock<Arc<Vec<Node>>>,
}

impl NodeRegistry {
    pub fn new(local_id: NodeId, members: &[NodeInfo]) -> Self {
        let mut nodes: Vec<Node> = members
            .iter()
            .map(|info| {
                let mut node = Node::new(info.id, info.address.clone());
                if info.id == local_id {
                    node.alive_state = AliveState::Alive;
                }
                node
            })
            .collect();
        nodes.sort_by_key(|n| n.id);

        Self {
            local_id,
            nodes: RwLock::new(Arc::new(nodes)),
        }
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    /// Snapshot of every node, ordered by id
    pub fn get_all(&self) -> Arc<Vec<Node>> {
        self.nodes.read().clone()
    }

    pub fn views(&self) -> Vec<NodeView> {
        self.get_all().iter().map(NodeView::from).collect()
    }

    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.get_all().iter().find(|n| n.id == id).cloned()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn leader(&self) -> Option<NodeId> {
        self.get_all().iter().find(|n| n.is_leader).map(|n| n.id)
    }

    /// Every node except the local one
    pub fn peers(&self) -> Vec<Node> {
        self.get_all()
            .iter()
            .filter(|n| n.id != self.local_id)
            .cloned()
            .collect()
    }

    pub fn higher_than(&self, id: NodeId) -> Vec<Node> {
        self.get_all().iter().filter(|n| n.id > id).cloned().collect()
    }

    pub fn set_alive(&self, id: NodeId, alive: bool) -> Result<bool> {
        let state = if alive {
            AliveState::Alive
        } else {
            AliveState::Dead
        };
        self.set_alive_state(id, state)
    }

    /// Returns whether the state actually changed
    pub fn set_alive_state(&self, id: NodeId, state: AliveState) -> Result<bool> {
        self.update(|nodes| {
            let node = find_mut(nodes, id)?;
            let changed = node.alive_state != state;
            node.alive_state = state;
            Ok(changed)
        })
    }

    pub fn record_heartbeat(&self, id: NodeId, at: Timestamp) -> Result<()> {
        self.update(|nodes| {
            find_mut(nodes, id)?.last_heartbeat_at = Some(at);
            Ok(())
        })
    }

    /// Make `id` the only leader
    pub fn set_leader(&self, id: NodeId) -> Result<()> {
        self.update(|nodes| {
            if !nodes.iter().any(|n| n.id == id) {
                return Err(BullyError::UnknownNode(id));
            }
            for node in nodes.iter_mut() {
                node.is_leader = node.id == id;
            }
            Ok(())
        })
    }

    pub fn clear_leader(&self) {
        let _ = self.update(|nodes| {
            for node in nodes.iter_mut() {
                node.is_leader = false;
            }
            Ok(())
        });
    }

    fn update<T>(&self, f: impl FnOnce(&mut Vec<Node>) -> Result<T>) -> Result<T> {
        let mut guard = self.nodes.write();
        let mut next = guard.as_ref().clone();
        let out = f(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }
}

fn find_mut(nodes: &mut [Node], id: NodeId) -> Result<&mut Node> {
    nodes
        .iter_mut()
        .find(|n| n.id == id)
        .ok_or(BullyError::UnknownNode(id))
}
