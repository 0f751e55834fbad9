pub mod api;
pub mod app;
pub mod bully;
pub mod client;
pub mod config;
pub mod detector;
pub mod events;
pub mod ledger;
pub mod network;
pub mod registry;
pub mod storage;
pub mod transactions;
pub mod util;

pub use app::{spawn_node, start_node, NodeApp};
pub use util::errors::{BullyError, Result};
