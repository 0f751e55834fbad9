use actix::prelude::*;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use std::sync::Arc;

use crate::api;
use crate::bully::actor::{BullyActor, Initialize};
use crate::bully::types::NodeId;
use crate::bully::ElectionLog;
use crate::config::NodeConfig;
use crate::detector::{FailureDetector, Listeners};
use crate::events::EventBus;
use crate::ledger::LedgerActor;
use crate::network::{HttpTransport, PeerTransport};
use crate::registry::NodeRegistry;
use crate::storage::{
    FileLedgerStorage, FileTransactionStorage, LedgerStorage, MemoryLedgerStorage,
    MemoryTransactionStorage, TransactionStorage,
};
use crate::transactions::TransactionLog;
use crate::util::errors::{BullyError, Result};

// Representation of one running node. Shared with every HTTP worker.
pub struct NodeApp {
    pub id: NodeId,
    pub addr: String,
    pub registry: Arc<NodeRegistry>,
    pub bus: Arc<EventBus>,
    pub transactions: Arc<TransactionLog>,
    pub history: Arc<ElectionLog>,
    pub transport: Arc<dyn PeerTransport>,
    pub bully: Addr<BullyActor>,
    pub ledger: Addr<LedgerActor>,
    pub detector: Addr<FailureDetector>,
}

impl NodeApp {
    /// Kick off the startup discovery / election
    pub fn initialize(&self) {
        self.bully.do_send(Initialize);
    }
}

/// Start the actors of one node on the current actix system. The election
/// stays idle until `NodeApp::initialize`.
pub fn spawn_node(config: &NodeConfig, transport: Arc<dyn PeerTransport>) -> Result<NodeApp> {
    let cluster = &config.cluster;
    cluster.validate().map_err(BullyError::InvalidConfig)?;

    let node_id = config.node_id;
    let registry = Arc::new(NodeRegistry::new(node_id, &cluster.nodes));
    let bus = Arc::new(EventBus::new(cluster.http.event_buffer));

    let (transaction_storage, ledger_storage): (Box<dyn TransactionStorage>, Box<dyn LedgerStorage>) =
        match config.data_dir() {
            Some(dir) => {
                tracing::info!("Node {} keeps its state in {}", node_id, dir.display());
                (
                    Box::new(FileTransactionStorage::new(dir.clone())?),
                    Box::new(FileLedgerStorage::new(dir)?),
                )
            }
            None => (
                Box::new(MemoryTransactionStorage::new()),
                Box::new(MemoryLedgerStorage::new()),
            ),
        };

    let transactions = Arc::new(TransactionLog::new(
        node_id,
        transaction_storage,
        bus.clone(),
        cluster.ledger.transaction_feed_len,
    )?);
    let history = Arc::new(ElectionLog::new(
        cluster.election.dedup_window(),
        cluster.election.max_history,
    ));

    let ledger = LedgerActor::new(
        &cluster.ledger,
        ledger_storage,
        registry.clone(),
        transport.clone(),
        transactions.clone(),
        bus.clone(),
    )?
    .start();

    let bully = BullyActor::new(
        cluster.election.clone(),
        registry.clone(),
        transport.clone(),
        history.clone(),
        bus.clone(),
        transactions.clone(),
        ledger.clone(),
    )
    .start();

    let detector = FailureDetector::new(
        cluster.detector.clone(),
        registry.clone(),
        transport.clone(),
        bus.clone(),
        transactions.clone(),
        Listeners {
            leader_failed: bully.clone().recipient(),
            leader_claim: bully.clone().recipient(),
            peer_back: ledger.clone().recipient(),
        },
    )
    .start();

    bus.publish_nodes(&registry);

    Ok(NodeApp {
        id: node_id,
        addr: config.address().to_string(),
        registry,
        bus,
        transactions,
        history,
        transport,
        bully,
        ledger,
        detector,
    })
}

/// Run a node with the HTTP transport until the server stops
pub async fn start_node(config: NodeConfig) -> std::io::Result<()> {
    let transport = HttpTransport::new(config.node_id, config.cluster.http.request_timeout())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let app = spawn_node(&config, Arc::new(transport))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let addr = app.addr.clone();

    tracing::info!("Node {} listening on {}", app.id, addr);

    let app = Data::new(app);
    app.initialize();

    // Start the actix-web server.
    let server = HttpServer::new(move || App::new().app_data(app.clone()).configure(api::configure));

    server.bind(addr)?.run().await
}
