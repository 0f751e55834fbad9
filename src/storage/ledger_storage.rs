use crate::ledger::seat::Seat;
use crate::util::errors::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

/// Trait for persisting the seat ledger snapshot
pub trait LedgerStorage: Send {
    fn save_seats(&mut self, seats: &[Seat]) -> Result<()>;
    /// None when nothing was ever saved
    fn load_seats(&self) -> Result<Option<Vec<Seat>>>;
}

#[derive(Default)]
pub struct MemoryLedgerStorage {
    seats: Option<Vec<Seat>>,
}

impl MemoryLedgerStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStorage for MemoryLedgerStorage {
    fn save_seats(&mut self, seats: &[Seat]) -> Result<()> {
        self.seats = Some(seats.to_vec());
        Ok(())
    }

    fn load_seats(&self) -> Result<Option<Vec<Seat>>> {
        Ok(self.seats.clone())
    }
}

/// File-based snapshot storage using bincode
pub struct FileLedgerStorage {
    data_dir: PathBuf,
}

impl FileLedgerStorage {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        // Create data directory if it doesn't exist
        fs::create_dir_all(&data_dir)?;

        Ok(Self { data_dir })
    }

    fn seats_file_path(&self) -> PathBuf {
        self.data_dir.join("seats.bin")
    }
}

impl LedgerStorage for FileLedgerStorage {
    fn save_seats(&mut self, seats: &[Seat]) -> Result<()> {
        let encoded = bincode::serialize(seats)?;

        // write aside then rename, a crash never leaves a torn snapshot
        let tmp_path = self.data_dir.join("seats.bin.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        file.write_all(&encoded)?;
        file.sync_all()?;
        fs::rename(&tmp_path, self.seats_file_path())?;

        Ok(())
    }

    fn load_seats(&self) -> Result<Option<Vec<Seat>>> {
        let path = self.seats_file_path();

        if !path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        if buffer.is_empty() {
            return Ok(None);
        }

        let seats: Vec<Seat> = bincode::deserialize(&buffer)?;

        tracing::info!("Loaded {} seats from disk", seats.len());

        Ok(Some(seats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::seat::seat_grid;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut seats = seat_grid(2, 3);
        seats[1].mark_booked("Jane Doe".to_string(), 2, crate::util::time::now());

        {
            let mut storage = FileLedgerStorage::new(temp_dir.path().to_path_buf()).unwrap();
            assert!(storage.load_seats().unwrap().is_none());
            storage.save_seats(&seats).unwrap();
        }

        let storage = FileLedgerStorage::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(storage.load_seats().unwrap(), Some(seats));
    }
}
