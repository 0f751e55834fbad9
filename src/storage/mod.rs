pub mod ledger_storage;
pub mod transaction_storage;

pub use ledger_storage::{FileLedgerStorage, LedgerStorage, MemoryLedgerStorage};
pub use transaction_storage::{FileTransactionStorage, MemoryTransactionStorage, TransactionStorage};
