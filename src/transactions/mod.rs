pub mod log;
pub mod transaction;

pub use log::TransactionLog;
pub use transaction::{ActionType, Transaction};
