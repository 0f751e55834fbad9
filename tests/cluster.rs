use std::sync::Arc;
use std::time::Duration;

use cinebully::bully::{ElectionEventType, NodeId};
use cinebully::config::{ClusterConfig, DetectorConfig, ElectionConfig, NodeInfo};
use cinebully::ledger::actor::{AcceptsBookings, GetSeats};
use cinebully::ledger::{book_or_forward, BookSeatRequest, SeatStatus};
use cinebully::network::{MemoryNetwork, MemoryPeer};
use cinebully::registry::AliveState;
use cinebully::util::time::now;
use cinebully::{BullyError, NodeApp};

struct Cluster {
    network: Arc<MemoryNetwork>,
    nodes: Vec<NodeApp>,
}

impl Cluster {
    fn node(&self, id: NodeId) -> &NodeApp {
        self.nodes.iter().find(|n| n.id == id).unwrap()
    }

    fn leaders(&self, ids: &[NodeId]) -> Vec<Option<NodeId>> {
        ids.iter().map(|id| self.node(*id).registry.leader()).collect()
    }
}

/// Three in-process nodes with short timeouts, all initialized
fn start_cluster() -> Cluster {
    let mut cluster = ClusterConfig::new(
        (1..=3)
            .map(|id| NodeInfo {
                id,
                address: format!("127.0.0.1:{}", 9300 + id),
            })
            .collect(),
    );
    cluster.election = ElectionConfig {
        election_timeout_ms: 100,
        coordinator_timeout_ms: 400,
        startup_delay_ms: 20,
        startup_jitter_ms: 20,
        dedup_window_ms: 2000,
        max_history: 100,
    };
    cluster.detector = DetectorConfig {
        ping_interval_ms: 50,
        ping_timeout_ms: 40,
        dead_after_misses: 2,
        heartbeat_audit_rounds: 0,
    };

    let network = MemoryNetwork::new();
    let nodes: Vec<NodeApp> = (1..=3)
        .map(|id| {
            let config = cluster.clone().for_node(id).unwrap();
            let transport = network
                .transport_for(id)
                .with_timeout(Duration::from_millis(200));
            cinebully::spawn_node(&config, Arc::new(transport)).unwrap()
        })
        .collect();

    for node in &nodes {
        network.register(
            node.id,
            MemoryPeer {
                bully: node.bully.clone(),
                ledger: node.ledger.clone(),
            },
        );
    }
    for node in &nodes {
        node.initialize();
    }

    Cluster { network, nodes }
}

async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Until `node` has merged its peers' seats and sells as leader
async fn wait_for_bookings(node: &NodeApp) {
    for _ in 0..100 {
        if node.ledger.send(AcceptsBookings).await.unwrap() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    panic!("node {} never opened bookings", node.id);
}

fn alive_state(cluster: &Cluster, on: NodeId, of: NodeId) -> Option<AliveState> {
    cluster.node(on).registry.get(of).map(|n| n.alive_state)
}

fn booking(seat: &str, customer: &str) -> BookSeatRequest {
    BookSeatRequest {
        seat_id: seat.to_string(),
        customer_name: customer.to_string(),
    }
}

#[actix_rt::test]
async fn test_highest_node_becomes_leader() {
    let cluster = start_cluster();

    wait_for("node 3 to lead", || {
        cluster.leaders(&[1, 2, 3]) == vec![Some(3); 3]
    })
    .await;

    let winners: Vec<_> = cluster
        .node(3)
        .history
        .snapshot()
        .into_iter()
        .filter(|e| e.event_type == ElectionEventType::Winner)
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].node_id, 3);
}

#[actix_rt::test]
async fn test_leader_failure_elects_next_highest() {
    let cluster = start_cluster();
    wait_for("node 3 to lead", || {
        cluster.leaders(&[1, 2, 3]) == vec![Some(3); 3]
    })
    .await;

    let killed_at = now();
    cluster.network.kill(3);

    wait_for("node 2 to take over", || {
        cluster.leaders(&[1, 2]) == vec![Some(2); 2]
    })
    .await;

    let winners_after = |id: NodeId| {
        cluster
            .node(id)
            .history
            .snapshot()
            .into_iter()
            .filter(|e| e.event_type == ElectionEventType::Winner && e.timestamp >= killed_at)
            .collect::<Vec<_>>()
    };
    let winners = winners_after(2);
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].node_id, 2);
    assert!(winners_after(1).is_empty());
}

#[actix_rt::test]
async fn test_follower_booking_is_forwarded_and_replicated() {
    let cluster = start_cluster();
    wait_for("node 3 to lead", || {
        cluster.leaders(&[1, 2, 3]) == vec![Some(3); 3]
    })
    .await;
    wait_for_bookings(cluster.node(3)).await;

    let follower = cluster.node(1);
    let seat = book_or_forward(
        &follower.ledger,
        &follower.registry,
        follower.transport.as_ref(),
        booking("A2", "Jane Doe"),
        false,
    )
    .await
    .unwrap();
    assert_eq!(seat.status, SeatStatus::Booked);
    assert_eq!(seat.booked_by_node_id, Some(3));

    for id in [1, 2] {
        let mut replicated = false;
        for _ in 0..50 {
            let seats = cluster.node(id).ledger.send(GetSeats).await.unwrap();
            let a2 = seats.iter().find(|s| s.seat_number == "A2").unwrap();
            if a2.is_booked() {
                assert_eq!(a2.customer_name.as_deref(), Some("Jane Doe"));
                replicated = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(replicated, "seat A2 not replicated to node {}", id);
    }

    let audited = cluster
        .node(3)
        .transactions
        .all()
        .into_iter()
        .any(|t| t.description == "Customer Jane Doe bought Seat A2");
    assert!(audited);
}

#[actix_rt::test]
async fn test_concurrent_bookings_across_nodes() {
    let cluster = start_cluster();
    wait_for("node 3 to lead", || {
        cluster.leaders(&[1, 2, 3]) == vec![Some(3); 3]
    })
    .await;
    wait_for_bookings(cluster.node(3)).await;

    let attempts = cluster.nodes.iter().map(|node| {
        book_or_forward(
            &node.ledger,
            &node.registry,
            node.transport.as_ref(),
            booking("B4", &format!("Customer {}", node.id)),
            false,
        )
    });
    let results = futures::future::join_all(attempts).await;

    let booked = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(BullyError::SeatConflict(_))))
        .count();
    assert_eq!(booked, 1);
    assert_eq!(conflicts, 2);
}

#[actix_rt::test]
async fn test_returning_node_takes_back_leadership() {
    let cluster = start_cluster();
    wait_for("node 3 to lead", || {
        cluster.leaders(&[1, 2, 3]) == vec![Some(3); 3]
    })
    .await;

    cluster.network.kill(3);
    wait_for("node 2 to take over", || {
        cluster.leaders(&[1, 2]) == vec![Some(2); 2]
    })
    .await;

    cluster.network.revive(3);
    wait_for("node 3 to lead again", || {
        cluster.leaders(&[1, 2, 3]) == vec![Some(3); 3]
    })
    .await;
}

#[actix_rt::test]
async fn test_returning_leader_does_not_resell_seat() {
    let cluster = start_cluster();
    wait_for("node 3 to lead", || {
        cluster.leaders(&[1, 2, 3]) == vec![Some(3); 3]
    })
    .await;

    cluster.network.kill(3);
    wait_for("node 2 to take over", || {
        cluster.leaders(&[1, 2]) == vec![Some(2); 2]
    })
    .await;
    wait_for("node 3 to lose sight of node 2", || {
        alive_state(&cluster, 3, 2) == Some(AliveState::Dead)
    })
    .await;
    wait_for_bookings(cluster.node(2)).await;

    let node2 = cluster.node(2);
    let first = book_or_forward(
        &node2.ledger,
        &node2.registry,
        node2.transport.as_ref(),
        booking("A2", "Jane Doe"),
        false,
    )
    .await
    .unwrap();
    assert_eq!(first.customer_name.as_deref(), Some("Jane Doe"));

    cluster.network.revive(3);
    wait_for("node 3 to lead again", || {
        cluster.leaders(&[1, 2, 3]) == vec![Some(3); 3]
    })
    .await;
    wait_for("node 3 to see node 2 again", || {
        alive_state(&cluster, 3, 2) == Some(AliveState::Alive)
    })
    .await;

    // node 3 answers unavailable while it merges, then knows A2 is taken
    let node3 = cluster.node(3);
    let mut second = Err(BullyError::NoLeaderAvailable);
    for _ in 0..50 {
        second = book_or_forward(
            &node3.ledger,
            &node3.registry,
            node3.transport.as_ref(),
            booking("A2", "John Smith"),
            false,
        )
        .await;
        if !matches!(second, Err(BullyError::NoLeaderAvailable)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(
        matches!(second, Err(BullyError::SeatConflict(ref s)) if s == "A2"),
        "second booking of A2: {:?}",
        second
    );

    for id in [2, 3] {
        let seats = cluster.node(id).ledger.send(GetSeats).await.unwrap();
        let a2 = seats.iter().find(|s| s.seat_number == "A2").unwrap();
        assert_eq!(a2.customer_name.as_deref(), Some("Jane Doe"), "node {}", id);
    }
}
