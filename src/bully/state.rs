use serde::{Deserialize, Serialize};

use super::types::{NodeId, Round};

/// The roles a node goes through during a Bully election
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Freshly started, leader unknown
    Idle,
    /// Sending ELECTION to higher nodes
    Electing,
    /// ELECTION sent, collecting OK replies
    WaitingForOk,
    /// Follows `leader`; with no leader it is waiting for a COORDINATOR
    Follower,
    /// This node is the coordinator
    Leader,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Idle => write!(f, "Idle"),
            Role::Electing => write!(f, "Electing"),
            Role::WaitingForOk => write!(f, "WaitingForOk"),
            Role::Follower => write!(f, "Follower"),
            Role::Leader => write!(f, "Leader"),
        }
    }
}

/// Election state of one node
#[derive(Debug, Clone)]
pub struct ElectionState {
    /// This node's ID
    pub node_id: NodeId,
    /// Current role of this node
    pub role: Role,
    /// ID of the current leader (if known)
    pub leader: Option<NodeId>,
    /// Incremented on every election this node starts; replies and timers
    /// carrying an older round are stale
    pub round: Round,
}

impl ElectionState {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            role: Role::Idle,
            leader: None,
            round: 0,
        }
    }

    /// Start a new round, forgetting the previous leader
    pub fn begin_election(&mut self) -> Round {
        self.round += 1;
        self.role = Role::Electing;
        self.leader = None;

        tracing::info!(
            "Node {} starting election (round: {})",
            self.node_id,
            self.round
        );

        self.round
    }

    /// ELECTION messages are out, now collecting replies
    pub fn await_ok(&mut self) {
        self.role = Role::WaitingForOk;
    }

    /// A higher node answered OK, wait for its COORDINATOR
    pub fn step_back(&mut self) {
        tracing::info!(
            "Node {} received OK, waiting for coordinator (round: {})",
            self.node_id,
            self.round
        );
        self.role = Role::Follower;
        self.leader = None;
    }

    pub fn become_leader(&mut self) {
        tracing::info!(
            "Node {} transitioning to Leader (round: {})",
            self.node_id,
            self.round
        );
        self.role = Role::Leader;
        self.leader = Some(self.node_id);
    }

    pub fn become_follower(&mut self, leader: NodeId) {
        tracing::info!(
            "Node {} transitioning to Follower of {}",
            self.node_id,
            leader
        );
        self.role = Role::Follower;
        self.leader = Some(leader);
    }

    /// True while a round is unresolved, including the wait for COORDINATOR
    pub fn is_electing(&self) -> bool {
        match self.role {
            Role::Electing | Role::WaitingForOk => true,
            Role::Follower => self.leader.is_none(),
            Role::Idle | Role::Leader => false,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    pub fn is_follower(&self) -> bool {
        self.role == Role::Follower
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_lifecycle() {
        let mut state = ElectionState::new(2);
        assert!(!state.is_electing());

        let round = state.begin_election();
        assert_eq!(round, 1);
        assert!(state.is_electing());

        state.await_ok();
        assert_eq!(state.role, Role::WaitingForOk);

        state.step_back();
        assert!(state.is_follower());
        assert!(state.is_electing(), "follower without leader is still electing");

        state.become_follower(3);
        assert!(!state.is_electing());
        assert_eq!(state.leader, Some(3));
    }

    #[test]
    fn test_new_round_clears_leader() {
        let mut state = ElectionState::new(3);
        state.begin_election();
        state.become_leader();
        assert_eq!(state.leader, Some(3));

        assert_eq!(state.begin_election(), 2);
        assert_eq!(state.leader, None);
        assert!(!state.is_leader());
    }
}
