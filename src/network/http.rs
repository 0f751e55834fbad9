use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::transport::PeerTransport;
use crate::bully::rpc::{ElectionReply, ElectionRequest, PingResponse, VictoryAck};
use crate::bully::types::NodeId;
use crate::ledger::rpc::{BookSeatRequest, ReplicatedBooking};
use crate::ledger::seat::Seat;
use crate::registry::Node;
use crate::util::errors::{BullyError, ErrorBody, Result};

/// Set on a booking the leader received from a follower, so it is not
/// forwarded a second time.
pub const FORWARDED_BY_HEADER: &str = "x-forwarded-by";

/// Peer calls over the JSON HTTP API of the other nodes
pub struct HttpTransport {
    local_id: NodeId,
    client: Client,
}

impl HttpTransport {
    pub fn new(local_id: NodeId, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self { local_id, client })
    }

    fn url(peer: &Node, path: &str) -> String {
        format!("http://{}{}", peer.address, path)
    }
}

/// Decode a 2xx body strictly, or turn the error body back into a `BullyError`
pub(crate) async fn read_response<T: DeserializeOwned>(response: Response, subject: &str) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        let bytes = response.bytes().await?;
        return Ok(serde_json::from_slice(&bytes)?);
    }

    let url = response.url().to_string();
    match response.json::<ErrorBody>().await {
        Ok(body) => Err(body.into_error(subject)),
        Err(_) => Err(BullyError::NetworkUnreachable(format!(
            "{} answered {}",
            url, status
        ))),
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn ping(&self, peer: &Node) -> Result<PingResponse> {
        let response = self
            .client
            .get(Self::url(peer, "/election/ping"))
            .send()
            .await?;

        read_response(response, "ping").await
    }

    async fn send_election(&self, peer: &Node, request: ElectionRequest) -> Result<ElectionReply> {
        tracing::debug!("Node {} -> {}: ELECTION", self.local_id, peer.id);

        let response = self
            .client
            .post(Self::url(peer, "/election/election"))
            .json(&request)
            .send()
            .await?;

        read_response(response, "election").await
    }

    async fn send_victory(&self, peer: &Node, leader_id: NodeId) -> Result<VictoryAck> {
        tracing::debug!("Node {} -> {}: COORDINATOR({})", self.local_id, peer.id, leader_id);

        let response = self
            .client
            .post(Self::url(peer, &format!("/election/victory/{}", leader_id)))
            .send()
            .await?;

        read_response(response, "victory").await
    }

    async fn replicate_booking(&self, peer: &Node, booking: ReplicatedBooking) -> Result<()> {
        let subject = booking.seat.seat_number.clone();
        let response = self
            .client
            .post(Self::url(peer, "/seat/replicate"))
            .json(&booking)
            .send()
            .await?;

        let _: Seat = read_response(response, &subject).await?;
        Ok(())
    }

    async fn fetch_seats(&self, peer: &Node) -> Result<Vec<Seat>> {
        let response = self.client.get(Self::url(peer, "/seat")).send().await?;

        read_response(response, "seat").await
    }

    async fn forward_booking(&self, leader: &Node, request: BookSeatRequest) -> Result<Seat> {
        tracing::debug!(
            "Node {} forwarding booking of {} to leader {}",
            self.local_id,
            request.seat_id,
            leader.id
        );

        let subject = request.seat_id.clone();
        let response = self
            .client
            .post(Self::url(leader, "/seat/book"))
            .header(FORWARDED_BY_HEADER, self.local_id.to_string())
            .json(&request)
            .send()
            .await?;

        read_response(response, &subject).await
    }
}
