use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::config::{DetectorConfig, ElectionConfig, HttpConfig, LedgerConfig};
use crate::bully::types::NodeId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub election: ElectionConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Root directory for persistent state, one `node-<id>` folder per node.
    /// Without it everything is kept in memory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    pub nodes: Vec<NodeInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    /// host:port the node listens on and peers call
    pub address: String,
}

/// Everything one node needs to run: the shared cluster file plus its own id.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub cluster: ClusterConfig,
}

impl ClusterConfig {
    /// In-memory cluster with default tunables
    pub fn new(nodes: Vec<NodeInfo>) -> Self {
        Self {
            election: ElectionConfig::default(),
            detector: DetectorConfig::default(),
            ledger: LedgerConfig::default(),
            http: HttpConfig::default(),
            data_dir: None,
            nodes,
        }
    }

    /// Load cluster configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        let config: ClusterConfig =
            toml::from_str(contents).map_err(|e| format!("Failed to parse config file: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("No nodes configured".to_string());
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(format!("Duplicate node id {}", node.id));
            }
            if node.address.is_empty() {
                return Err(format!("Node {} has an empty address", node.id));
            }
        }

        self.election.validate()?;
        self.detector.validate()?;
        self.ledger.validate()?;

        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Bind this cluster description to one of its members
    pub fn for_node(self, node_id: NodeId) -> Result<NodeConfig, String> {
        if self.node(node_id).is_none() {
            return Err(format!("Node {} is not listed in [[nodes]]", node_id));
        }

        Ok(NodeConfig {
            node_id,
            cluster: self,
        })
    }
}

impl NodeConfig {
    pub fn address(&self) -> &str {
        self.cluster
            .node(self.node_id)
            .map(|n| n.address.as_str())
            .unwrap_or_default()
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.cluster
            .data_dir
            .as_ref()
            .map(|dir| dir.join(format!("node-{}", self.node_id)))
    }
}
