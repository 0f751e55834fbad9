pub mod cluster_config;
pub mod config;

pub use cluster_config::{ClusterConfig, NodeConfig, NodeInfo};
pub use config::{DetectorConfig, ElectionConfig, HttpConfig, LedgerConfig};
