pub mod client;

pub use client::{ClusterClient, DEFAULT_DEGRADED_AFTER, DEFAULT_TIMEOUT};
