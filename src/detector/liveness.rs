use std::collections::HashMap;

use crate::bully::types::NodeId;
use crate::registry::AliveState;

/// A change of a peer's liveness verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub node_id: NodeId,
    pub from: AliveState,
    pub to: AliveState,
}

#[derive(Debug, Clone, Copy)]
struct PeerLiveness {
    state: AliveState,
    misses: u32,
}

/// Per-peer miss counting.
///
/// One miss makes a peer `Suspected`, `dead_after_misses` consecutive misses
/// make it `Dead`, one success makes it `Alive` again. Peers not heard from
/// yet are `Suspected`.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    dead_after_misses: u32,
    peers: HashMap<NodeId, PeerLiveness>,
}

impl LivenessTracker {
    pub fn new(dead_after_misses: u32, peers: impl IntoIterator<Item = NodeId>) -> Self {
        let peers = peers
            .into_iter()
            .map(|id| {
                (
                    id,
                    PeerLiveness {
                        state: AliveState::Suspected,
                        misses: 0,
                    },
                )
            })
            .collect();

        Self {
            dead_after_misses: dead_after_misses.max(2),
            peers,
        }
    }

    pub fn state(&self, node_id: NodeId) -> AliveState {
        self.peers
            .get(&node_id)
            .map(|p| p.state)
            .unwrap_or(AliveState::Suspected)
    }

    pub fn record_success(&mut self, node_id: NodeId) -> Option<Transition> {
        let peer = self.entry(node_id);
        peer.misses = 0;
        Self::move_to(node_id, peer, AliveState::Alive)
    }

    pub fn record_miss(&mut self, node_id: NodeId) -> Option<Transition> {
        let dead_after = self.dead_after_misses;
        let peer = self.entry(node_id);
        peer.misses = peer.misses.saturating_add(1);

        let next = if peer.misses >= dead_after {
            AliveState::Dead
        } else {
            AliveState::Suspected
        };
        Self::move_to(node_id, peer, next)
    }

    fn entry(&mut self, node_id: NodeId) -> &mut PeerLiveness {
        self.peers.entry(node_id).or_insert(PeerLiveness {
            state: AliveState::Suspected,
            misses: 0,
        })
    }

    fn move_to(node_id: NodeId, peer: &mut PeerLiveness, to: AliveState) -> Option<Transition> {
        if peer.state == to {
            return None;
        }

        let from = peer.state;
        peer.state = to;
        Some(Transition { node_id, from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_after_consecutive_misses() {
        let mut tracker = LivenessTracker::new(3, [2]);
        assert_eq!(
            tracker.record_success(2).map(|t| t.to),
            Some(AliveState::Alive)
        );

        assert_eq!(
            tracker.record_miss(2).map(|t| t.to),
            Some(AliveState::Suspected)
        );
        assert_eq!(tracker.record_miss(2), None);
        assert_eq!(
            tracker.record_miss(2),
            Some(Transition {
                node_id: 2,
                from: AliveState::Suspected,
                to: AliveState::Dead,
            })
        );

        // reported once
        assert_eq!(tracker.record_miss(2), None);
        assert_eq!(tracker.state(2), AliveState::Dead);
    }

    #[test]
    fn test_one_success_revives() {
        let mut tracker = LivenessTracker::new(2, [1]);
        tracker.record_miss(1);
        tracker.record_miss(1);
        assert_eq!(tracker.state(1), AliveState::Dead);

        let revived = tracker.record_success(1);
        assert_eq!(revived.map(|t| (t.from, t.to)), Some((AliveState::Dead, AliveState::Alive)));

        // miss counter restarted
        assert_eq!(tracker.record_miss(1).map(|t| t.to), Some(AliveState::Suspected));
    }

    #[test]
    fn test_threshold_has_a_floor() {
        let mut tracker = LivenessTracker::new(1, [4]);
        tracker.record_miss(4);
        assert_eq!(tracker.state(4), AliveState::Suspected);
    }
}
