//! HTTP + WebSocket surface of a node.
//!
//!  - `GET  /node`, `GET /seat`, `GET /transaction`, `GET /election/events`: read models
//!  - `POST /seat/book`: book a seat (followers forward to the leader once)
//!  - `GET  /election/ping`, `POST /election/election`, `POST /election/victory/{id}`: Bully traffic
//!  - `POST /seat/replicate`: leader -> follower booking push
//!  - `GET  /ws`: live event streams

pub mod cluster;
pub mod election;
pub mod error;
pub mod seat;
pub mod ws;

use actix_web::web::ServiceConfig;

pub use error::{json_config, path_config};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .service(cluster::nodes)
        .service(cluster::transactions)
        .service(seat::seats)
        .service(seat::book)
        .service(seat::replicate)
        .service(election::events)
        .service(election::ping)
        .service(election::election)
        .service(election::victory)
        .service(election::state)
        .service(ws::connect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::web::Data;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    use crate::app::{spawn_node, NodeApp};
    use crate::config::{ClusterConfig, NodeInfo};
    use crate::ledger::actor::CatchUp;
    use crate::network::MemoryNetwork;

    fn node(id: u64) -> NodeApp {
        let cluster = ClusterConfig::new(
            (1..=3)
                .map(|member| NodeInfo {
                    id: member,
                    address: format!("127.0.0.1:{}", 9200 + member),
                })
                .collect(),
        );
        let config = cluster.for_node(id).unwrap();
        let transport = Arc::new(MemoryNetwork::new().transport_for(id));
        spawn_node(&config, transport).unwrap()
    }

    #[actix_web::test]
    async fn test_leader_books_seat() {
        let app = node(3);
        app.registry.set_leader(3).unwrap();
        app.ledger.send(CatchUp).await.unwrap();
        let service = test::init_service(App::new().app_data(Data::new(app)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/seat/book")
            .set_json(json!({"seatId": "A2", "customerName": "Jane Doe"}))
            .to_request();
        let seat: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(seat["seat_number"], "A2");
        assert_eq!(seat["status"], "BOOKED");
        assert_eq!(seat["customer_name"], "Jane Doe");
        assert_eq!(seat["booked_by_node_id"], 3);

        let req = test::TestRequest::post()
            .uri("/seat/book")
            .set_json(json!({"seatId": "A2", "customerName": "John Smith"}))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "SeatConflict");
        assert_eq!(body["retryable"], false);

        let req = test::TestRequest::get().uri("/seat").to_request();
        let seats: Value = test::call_and_read_body_json(&service, req).await;
        let a2 = seats
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["seat_number"] == "A2")
            .cloned()
            .unwrap();
        assert_eq!(a2["status"], "BOOKED");
        assert_eq!(a2["customer_name"], "Jane Doe");
        assert_eq!(a2["booked_by_node_id"], 3);

        let req = test::TestRequest::get().uri("/transaction").to_request();
        let transactions: Value = test::call_and_read_body_json(&service, req).await;
        let descriptions: Vec<_> = transactions
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["description"].as_str().unwrap().to_string())
            .collect();
        assert!(descriptions.contains(&"Customer Jane Doe bought Seat A2".to_string()));
    }

    #[actix_web::test]
    async fn test_booking_during_election_is_unavailable() {
        let service = test::init_service(App::new().app_data(Data::new(node(2))).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/seat/book")
            .set_json(json!({"seatId": "B4", "customerName": "Lisa Ray"}))
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "NoLeaderAvailable");
        assert_eq!(body["retryable"], true);
    }

    #[actix_web::test]
    async fn test_malformed_bodies_are_rejected() {
        let service = test::init_service(App::new().app_data(Data::new(node(3))).configure(configure)).await;

        for body in [
            json!({"seatId": "A1"}),
            json!({"seatId": "A1", "customerName": "Jane", "price": 12}),
        ] {
            let req = test::TestRequest::post()
                .uri("/seat/book")
                .set_json(body)
                .to_request();
            let resp = test::call_service(&service, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "MalformedMessage");
        }

        let req = test::TestRequest::post()
            .uri("/election/victory/not-a-number")
            .to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_election_endpoints() {
        let service = test::init_service(App::new().app_data(Data::new(node(2))).configure(configure)).await;

        // a higher sender gets no OK
        let req = test::TestRequest::post()
            .uri("/election/election")
            .set_json(json!({"senderId": 3}))
            .to_request();
        let reply: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(reply, json!({"ok": false, "responderId": 2}));

        let req = test::TestRequest::post().uri("/election/victory/3").to_request();
        let ack: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(ack["accepted"], true);

        let req = test::TestRequest::get().uri("/election/ping").to_request();
        let ping: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(ping["nodeId"], 2);
        assert_eq!(ping["role"], "FOLLOWER");
        assert_eq!(ping["leaderId"], 3);

        let req = test::TestRequest::get().uri("/node").to_request();
        let nodes: Value = test::call_and_read_body_json(&service, req).await;
        let leaders: Vec<_> = nodes
            .as_array()
            .unwrap()
            .iter()
            .filter(|n| n["isLeader"] == true)
            .map(|n| n["id"].clone())
            .collect();
        assert_eq!(leaders, vec![json!(3)]);

        let req = test::TestRequest::post().uri("/election/victory/9").to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
