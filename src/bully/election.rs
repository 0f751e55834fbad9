use super::rpc::{ElectionReply, ElectionRequest, PingResponse};
use super::state::{ElectionState, Role};
use super::types::{NodeId, Round};

/// What to do with an incoming ELECTION
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionDecision {
    pub reply: ElectionReply,
    /// Receiver is higher and idle: it runs its own round
    pub start_round: bool,
    /// Receiver already leads: send COORDINATOR back to the sender
    pub reannounce: bool,
}

/// Result of collecting the replies of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The round was superseded while the replies were in flight
    Stale,
    /// Nobody higher answered, this node is the coordinator
    Won,
    /// A higher node answered OK
    SteppedBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorOutcome {
    Accepted {
        /// This node was leader and downgraded
        yielded: bool,
        /// The leader pointer moved
        changed: bool,
    },
    /// Announcer is lower than this node, which must bully it
    Rejected,
}

/// What to do when a ping shows a peer acting as leader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAction {
    Ignore,
    /// The claimant is the highest leader seen, follow it
    Follow,
    /// This node leads and outranks the claimant
    Reannounce,
    /// The claimant is lower and nobody higher leads
    StartRound,
}

/// Handle incoming ELECTION
pub fn handle_election_request(state: &ElectionState, request: &ElectionRequest) -> ElectionDecision {
    tracing::debug!(
        "Node {} received ELECTION from {} (role: {})",
        state.node_id,
        request.sender_id,
        state.role
    );

    let reply = |ok| ElectionReply {
        ok,
        responder_id: state.node_id,
    };

    // Only lower nodes may be bullied
    if request.sender_id >= state.node_id {
        return ElectionDecision {
            reply: reply(false),
            start_round: false,
            reannounce: false,
        };
    }

    ElectionDecision {
        reply: reply(true),
        start_round: !state.is_leader() && !state.is_electing(),
        reannounce: state.is_leader(),
    }
}

/// Decide a round once every ELECTION call finished or timed out.
/// `None` entries are peers that could not be reached in time.
pub fn handle_election_replies(
    state: &mut ElectionState,
    round: Round,
    replies: &[Option<ElectionReply>],
) -> RoundOutcome {
    if round != state.round || state.role != Role::WaitingForOk {
        tracing::debug!(
            "Node {} ignoring replies of stale round {} (current: {}, role: {})",
            state.node_id,
            round,
            state.round,
            state.role
        );
        return RoundOutcome::Stale;
    }

    let bullied = replies
        .iter()
        .flatten()
        .any(|r| r.ok && r.responder_id > state.node_id);

    if bullied {
        state.step_back();
        RoundOutcome::SteppedBack
    } else {
        state.become_leader();
        RoundOutcome::Won
    }
}

/// Handle incoming COORDINATOR
pub fn handle_coordinator(state: &mut ElectionState, leader_id: NodeId) -> CoordinatorOutcome {
    if leader_id == state.node_id && state.is_leader() {
        return CoordinatorOutcome::Accepted {
            yielded: false,
            changed: false,
        };
    }

    if leader_id <= state.node_id {
        tracing::info!(
            "Node {} rejects coordinator {} - lower id",
            state.node_id,
            leader_id
        );
        return CoordinatorOutcome::Rejected;
    }

    let yielded = state.is_leader();
    let changed = state.leader != Some(leader_id);
    state.become_follower(leader_id);

    if yielded {
        tracing::info!("Node {} yields leadership to {}", state.node_id, leader_id);
    }

    CoordinatorOutcome::Accepted { yielded, changed }
}

/// True if the wait for COORDINATOR of `round` expired without a leader
pub fn coordinator_timed_out(state: &ElectionState, round: Round) -> bool {
    state.round == round && state.is_follower() && state.leader.is_none()
}

/// Resolve two leaders, e.g. a partitioned leader coming back. The higher
/// id always ends up leading; a follower of an even higher leader stays put.
pub fn handle_leader_claim(state: &ElectionState, claimant: NodeId) -> ClaimAction {
    if claimant == state.node_id || state.role == Role::Idle || state.is_electing() {
        return ClaimAction::Ignore;
    }

    match state.leader {
        Some(leader) if leader == claimant => ClaimAction::Ignore,
        Some(leader) if leader > claimant => {
            if state.is_leader() {
                ClaimAction::Reannounce
            } else {
                ClaimAction::Ignore
            }
        }
        _ if claimant > state.node_id => ClaimAction::Follow,
        _ => ClaimAction::StartRound,
    }
}

/// Leader to follow after the startup discovery, if any higher node leads
pub fn discovered_leader(state: &ElectionState, pings: &[Option<PingResponse>]) -> Option<NodeId> {
    pings
        .iter()
        .flatten()
        .filter_map(|p| p.leader_id)
        .max()
        .filter(|leader| *leader > state.node_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_from(id: NodeId) -> Option<ElectionReply> {
        Some(ElectionReply {
            ok: true,
            responder_id: id,
        })
    }

    #[test]
    fn test_idle_node_bullies_lower_sender() {
        let state = ElectionState::new(3);
        let decision = handle_election_request(&state, &ElectionRequest { sender_id: 1 });

        assert!(decision.reply.ok);
        assert_eq!(decision.reply.responder_id, 3);
        assert!(decision.start_round);
        assert!(!decision.reannounce);
    }

    #[test]
    fn test_electing_node_does_not_start_twice() {
        let mut state = ElectionState::new(3);
        state.begin_election();
        state.await_ok();

        let decision = handle_election_request(&state, &ElectionRequest { sender_id: 2 });
        assert!(decision.reply.ok);
        assert!(!decision.start_round);
    }

    #[test]
    fn test_leader_reannounces() {
        let mut state = ElectionState::new(3);
        state.begin_election();
        state.become_leader();

        let decision = handle_election_request(&state, &ElectionRequest { sender_id: 1 });
        assert!(decision.reply.ok);
        assert!(decision.reannounce);
        assert!(!decision.start_round);
    }

    #[test]
    fn test_higher_sender_gets_no_ok() {
        let state = ElectionState::new(2);
        let decision = handle_election_request(&state, &ElectionRequest { sender_id: 5 });
        assert!(!decision.reply.ok);
        assert!(!decision.start_round);
    }

    #[test]
    fn test_no_replies_wins() {
        let mut state = ElectionState::new(2);
        let round = state.begin_election();
        state.await_ok();

        let outcome = handle_election_replies(&mut state, round, &[None, None]);
        assert_eq!(outcome, RoundOutcome::Won);
        assert!(state.is_leader());
        assert_eq!(state.leader, Some(2));
    }

    #[test]
    fn test_ok_from_higher_steps_back() {
        let mut state = ElectionState::new(1);
        let round = state.begin_election();
        state.await_ok();

        let outcome = handle_election_replies(&mut state, round, &[None, ok_from(2)]);
        assert_eq!(outcome, RoundOutcome::SteppedBack);
        assert!(state.is_electing());
        assert!(coordinator_timed_out(&state, round));
    }

    #[test]
    fn test_stale_round_is_ignored() {
        let mut state = ElectionState::new(1);
        let first = state.begin_election();
        state.await_ok();
        state.begin_election();
        state.await_ok();

        let outcome = handle_election_replies(&mut state, first, &[]);
        assert_eq!(outcome, RoundOutcome::Stale);
        assert_eq!(state.role, Role::WaitingForOk);
    }

    #[test]
    fn test_leader_yields_to_higher_coordinator() {
        let mut state = ElectionState::new(2);
        state.begin_election();
        state.become_leader();

        let outcome = handle_coordinator(&mut state, 3);
        assert_eq!(
            outcome,
            CoordinatorOutcome::Accepted {
                yielded: true,
                changed: true
            }
        );
        assert_eq!(state.leader, Some(3));
        assert!(state.is_follower());
    }

    #[test]
    fn test_lower_coordinator_rejected() {
        let mut state = ElectionState::new(3);
        state.become_follower(4);

        assert_eq!(handle_coordinator(&mut state, 2), CoordinatorOutcome::Rejected);
        assert_eq!(state.leader, Some(4));
    }

    #[test]
    fn test_discovery_only_follows_higher_leader() {
        let state = ElectionState::new(2);
        let ping = |leader| {
            Some(PingResponse {
                node_id: 1,
                role: Role::Follower,
                is_leader: false,
                leader_id: leader,
            })
        };

        assert_eq!(discovered_leader(&state, &[ping(Some(3)), None]), Some(3));
        assert_eq!(discovered_leader(&state, &[ping(Some(1))]), None);
        assert_eq!(discovered_leader(&state, &[ping(None), None]), None);
    }

    #[test]
    fn test_leader_claims_resolve_to_highest() {
        let mut leader = ElectionState::new(3);
        leader.begin_election();
        leader.become_leader();
        assert_eq!(handle_leader_claim(&leader, 2), ClaimAction::Reannounce);
        assert_eq!(handle_leader_claim(&leader, 4), ClaimAction::Follow);

        let mut follower = ElectionState::new(1);
        follower.become_follower(3);
        // stale claim of a node that already yielded
        assert_eq!(handle_leader_claim(&follower, 2), ClaimAction::Ignore);
        assert_eq!(handle_leader_claim(&follower, 3), ClaimAction::Ignore);

        let mut lower_leader = ElectionState::new(2);
        lower_leader.become_follower(1);
        assert_eq!(handle_leader_claim(&lower_leader, 3), ClaimAction::Follow);

        let mut electing = ElectionState::new(2);
        electing.begin_election();
        assert_eq!(handle_leader_claim(&electing, 3), ClaimAction::Ignore);
    }
}
