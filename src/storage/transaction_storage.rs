use crate::transactions::Transaction;
use crate::util::errors::{BullyError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

// A single audit record never gets anywhere near this
const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Trait for the append-only transaction journal
pub trait TransactionStorage: Send {
    fn append(&mut self, transaction: &Transaction) -> Result<()>;
    fn load_all(&self) -> Result<Vec<Transaction>>;
}

/// Journal kept in memory only
#[derive(Default)]
pub struct MemoryTransactionStorage {
    entries: Vec<Transaction>,
}

impl MemoryTransactionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStorage for MemoryTransactionStorage {
    fn append(&mut self, transaction: &Transaction) -> Result<()> {
        self.entries.push(transaction.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Transaction>> {
        Ok(self.entries.clone())
    }
}

/// File journal: each record is a 4-byte big-endian length followed by the
/// bincode payload, appended and synced one at a time.
pub struct FileTransactionStorage {
    data_dir: PathBuf,
}

impl FileTransactionStorage {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        // Create data directory if it doesn't exist
        fs::create_dir_all(&data_dir)?;

        Ok(Self { data_dir })
    }

    fn journal_path(&self) -> PathBuf {
        self.data_dir.join("transactions.bin")
    }
}

impl TransactionStorage for FileTransactionStorage {
    fn append(&mut self, transaction: &Transaction) -> Result<()> {
        let encoded = bincode::serialize(transaction)?;
        if encoded.len() > MAX_RECORD_SIZE {
            return Err(BullyError::StorageError(format!(
                "transaction {} is {} bytes, limit is {}",
                transaction.id,
                encoded.len(),
                MAX_RECORD_SIZE
            )));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.journal_path())?;

        file.write_all(&(encoded.len() as u32).to_be_bytes())?;
        file.write_all(&encoded)?;
        file.sync_data()?;

        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Transaction>> {
        let path = self.journal_path();

        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut buffer = Vec::new();
        File::open(&path)?.read_to_end(&mut buffer)?;

        let mut entries = Vec::new();
        let mut offset = 0;

        while offset < buffer.len() {
            let Some(len_bytes) = buffer.get(offset..offset + 4) else {
                break;
            };
            let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
                as usize;

            if len == 0 || len > MAX_RECORD_SIZE {
                return Err(BullyError::StorageError(format!(
                    "corrupt journal record at offset {}",
                    offset
                )));
            }

            let Some(payload) = buffer.get(offset + 4..offset + 4 + len) else {
                break;
            };

            entries.push(bincode::deserialize::<Transaction>(payload)?);
            offset += 4 + len;
        }

        if offset < buffer.len() {
            // a crash in the middle of an append leaves a partial tail
            tracing::warn!(
                "Ignoring {} trailing bytes of a partial journal record",
                buffer.len() - offset
            );
        }

        tracing::info!("Loaded {} transactions from disk", entries.len());

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::ActionType;
    use crate::util::time::now;
    use tempfile::TempDir;

    fn transaction(id: u64) -> Transaction {
        Transaction {
            id,
            node_id: 3,
            action_type: ActionType::Book,
            description: format!("Customer {} bought Seat A{}", id, id),
            created_at: now(),
        }
    }

    #[test]
    fn test_journal_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let written = vec![transaction(1), transaction(2)];

        {
            let mut storage = FileTransactionStorage::new(temp_dir.path().to_path_buf()).unwrap();
            for tx in &written {
                storage.append(tx).unwrap();
            }
        }

        let storage = FileTransactionStorage::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(storage.load_all().unwrap(), written);
    }

    #[test]
    fn test_partial_tail_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileTransactionStorage::new(temp_dir.path().to_path_buf()).unwrap();
        storage.append(&transaction(1)).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(temp_dir.path().join("transactions.bin"))
            .unwrap();
        file.write_all(&[0, 0, 0, 40, 1, 2]).unwrap();

        assert_eq!(storage.load_all().unwrap().len(), 1);
    }
}
