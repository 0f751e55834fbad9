use parking_lot::Mutex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::bully::rpc::PingResponse;
use crate::bully::ElectionEvent;
use crate::ledger::{BookSeatRequest, Seat};
use crate::network::http::read_response;
use crate::registry::NodeView;
use crate::transactions::Transaction;
use crate::util::errors::Result;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Consecutive failures before the client reports itself degraded
pub const DEFAULT_DEGRADED_AFTER: u32 = 3;

#[derive(Default)]
struct LastKnown {
    failures: u32,
    nodes: Option<Vec<NodeView>>,
    seats: Option<Vec<Seat>>,
    transactions: Option<Vec<Transaction>>,
    elections: Option<Vec<ElectionEvent>>,
}

/// Dashboard-side client of one node.
///
/// Every read remembers the last good answer. Once `degraded_after` calls in
/// a row failed, reads fall back to that answer instead of erroring, so a
/// dashboard keeps showing the last known cluster state.
pub struct ClusterClient {
    addr: String,
    inner: Client,
    degraded_after: u32,
    last: Mutex<LastKnown>,
}

impl ClusterClient {
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        Self::with_timeout(addr, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(addr: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            addr: addr.into(),
            inner: Client::builder().timeout(timeout).build()?,
            degraded_after: DEFAULT_DEGRADED_AFTER,
            last: Mutex::new(LastKnown::default()),
        })
    }

    pub fn degraded_after(mut self, failures: u32) -> Self {
        self.degraded_after = failures.max(1);
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn degraded(&self) -> bool {
        self.last.lock().failures >= self.degraded_after
    }

    pub fn failures(&self) -> u32 {
        self.last.lock().failures
    }

    // --- Read models

    pub async fn nodes(&self) -> Result<Vec<NodeView>> {
        self.cached_get("/node", |last| &mut last.nodes).await
    }

    pub async fn seats(&self) -> Result<Vec<Seat>> {
        self.cached_get("/seat", |last| &mut last.seats).await
    }

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.cached_get("/transaction", |last| &mut last.transactions).await
    }

    pub async fn election_events(&self) -> Result<Vec<ElectionEvent>> {
        self.cached_get("/election/events", |last| &mut last.elections).await
    }

    // --- Calls without a fallback

    pub async fn ping(&self) -> Result<PingResponse> {
        let result = self.get("/election/ping").await;
        self.track(result.is_ok());
        result
    }

    pub async fn book(&self, seat_id: &str, customer_name: &str) -> Result<Seat> {
        let request = BookSeatRequest {
            seat_id: seat_id.to_string(),
            customer_name: customer_name.to_string(),
        };

        let result = self.post("/seat/book", &request, seat_id).await;

        // a refused booking still means the node answered
        self.track(!matches!(&result, Err(e) if e.is_retryable()));
        result
    }

    // --- Internal methods

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn track(&self, ok: bool) {
        let mut last = self.last.lock();
        if ok {
            if last.failures >= self.degraded_after {
                tracing::info!("Node {} is answering again", self.addr);
            }
            last.failures = 0;
        } else {
            last.failures = last.failures.saturating_add(1);
            if last.failures == self.degraded_after {
                tracing::warn!(
                    "Node {} failed {} times in a row, serving last known state",
                    self.addr,
                    last.failures
                );
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.inner.get(self.url(path)).send().await?;
        read_response(response, path).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B, subject: &str) -> Result<T> {
        let response = self.inner.post(self.url(path)).json(body).send().await?;
        read_response(response, subject).await
    }

    async fn cached_get<T, F>(&self, path: &str, slot: F) -> Result<T>
    where
        T: DeserializeOwned + Clone,
        F: Fn(&mut LastKnown) -> &mut Option<T>,
    {
        let result = self.get::<T>(path).await;
        self.track(result.is_ok());

        let mut last = self.last.lock();
        match result {
            Ok(value) => {
                *slot(&mut *last) = Some(value.clone());
                Ok(value)
            }
            Err(e) => {
                let degraded = last.failures >= self.degraded_after;
                match slot(&mut *last).clone() {
                    Some(cached) if degraded => {
                        tracing::debug!("GET {} failed ({}), using cached value", path, e);
                        Ok(cached)
                    }
                    _ => Err(e),
                }
            }
        }
    }
}
