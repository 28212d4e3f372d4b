use crate::state::LedgerState;
use duet_core::{LedgerReceipt, StoreError};
use log::{debug, info};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Durable storage for whole-state snapshots
pub trait SnapshotStore {
    /// Persist the given state, replacing any previous snapshot
    fn save(&self, state: &LedgerState) -> Result<(), StoreError>;

    /// Load the last saved state, or `None` if nothing was ever saved
    fn load(&self) -> Result<Option<LedgerState>, StoreError>;
}

/// Snapshot store backed by a single bincode file
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, state: &LedgerState) -> Result<(), StoreError> {
        let encoded = bincode::serialize(state)?;
        // A crash mid-write must not clobber the last good snapshot
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, &encoded)?;
        fs::rename(&staging, &self.path)?;
        debug!("Saved snapshot ({} bytes) to {}", encoded.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<LedgerState>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let state = bincode::deserialize(&bytes)?;
        Ok(Some(state))
    }
}

/// Append-only receipt log backed by a file.
///
/// Each record is a length-prefixed bincode encoding of one
/// [`LedgerReceipt`], flushed as soon as it is written. Reopening an
/// existing file continues appending after the records already there, so
/// the log holds the full receipt history across restarts.
pub struct FileReceiptLog {
    path: PathBuf,
    writer: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl FileReceiptLog {
    /// Open the log at `path`, creating it if needed
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        info!("Opened receipt log at {}", path.display());
        Ok(Self {
            path: path.to_owned(),
            writer: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one receipt and flush it to disk
    pub fn append(&self, receipt: &LedgerReceipt) -> Result<(), StoreError> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|e| StoreError::Log(format!("Failed to acquire lock: {}", e)))?;
        let writer = guard
            .as_mut()
            .ok_or_else(|| StoreError::Log("Receipt log is closed".to_string()))?;

        let serialized = bincode::serialize(receipt)?;
        let record_len = serialized.len() as u64;
        writer.write_all(&record_len.to_le_bytes())?;
        writer.write_all(&serialized)?;
        writer.flush()?;
        Ok(())
    }

    /// Read the log from the beginning.
    ///
    /// Returns an empty iterator if the file cannot be opened, e.g. when
    /// nothing has been appended yet.
    pub fn iterate(&self) -> Box<dyn Iterator<Item = Result<LedgerReceipt, StoreError>> + '_> {
        match File::open(&self.path) {
            Ok(file) => Box::new(ReceiptLogIterator {
                reader: BufReader::new(file),
            }),
            Err(_) => Box::new(std::iter::empty()),
        }
    }

    /// Flush and drop the writer; later appends fail
    pub fn close(&self) -> Result<(), StoreError> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|e| StoreError::Log(format!("Failed to acquire lock: {}", e)))?;
        if let Some(mut writer) = guard.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

struct ReceiptLogIterator {
    reader: BufReader<File>,
}

impl Iterator for ReceiptLogIterator {
    type Item = Result<LedgerReceipt, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut len_bytes = [0u8; 8];
        match self.reader.read_exact(&mut len_bytes) {
            Ok(()) => {
                let record_len = u64::from_le_bytes(len_bytes);
                let mut record = vec![0u8; record_len as usize];
                match self.reader.read_exact(&mut record) {
                    Ok(()) => Some(bincode::deserialize(&record).map_err(|e| e.into())),
                    Err(e) => Some(Err(StoreError::Io(e))),
                }
            }
            // A clean end of file means the log is exhausted
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => None,
            Err(e) => Some(Err(StoreError::Io(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use duet_core::{AccountId, Amount, LedgerConfig, LedgerEvent};
    use tempfile::tempdir;

    fn receipt(sequence: u64) -> LedgerReceipt {
        LedgerReceipt::success(
            [sequence as u8; 32],
            sequence,
            1_700_000_000 + sequence,
            vec![LedgerEvent::FungibleMinted {
                to: AccountId::new("alice"),
                amount: Amount::new(sequence as u128),
            }],
        )
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("ledger.snapshot"));

        assert!(store.load().unwrap().is_none());

        let config = LedgerConfig::new(Amount::new(1000)).unwrap();
        let mut ledger = Ledger::new(config.clone(), AccountId::new("admin")).unwrap();
        ledger
            .mint_fungible(
                &AccountId::new("admin"),
                &AccountId::new("alice"),
                Amount::new(2500),
            )
            .unwrap();

        store.save(ledger.state()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, *ledger.state());

        let resumed = Ledger::from_state(config, loaded).unwrap();
        assert_eq!(resumed.total_supply(), 2);
    }

    #[test]
    fn test_snapshot_overwrites_previous() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("ledger.snapshot"));

        let config = LedgerConfig::new(Amount::new(1000)).unwrap();
        let mut ledger = Ledger::new(config, AccountId::new("admin")).unwrap();
        store.save(ledger.state()).unwrap();

        ledger
            .mint_fungible(
                &AccountId::new("admin"),
                &AccountId::new("alice"),
                Amount::new(1000),
            )
            .unwrap();
        store.save(ledger.state()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, *ledger.state());
    }

    #[test]
    fn test_receipt_log_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.log");
        let log = FileReceiptLog::new(&path).unwrap();

        for sequence in 1..=3 {
            log.append(&receipt(sequence)).unwrap();
        }

        let read: Vec<LedgerReceipt> = log.iterate().map(|r| r.unwrap()).collect();
        assert_eq!(read, vec![receipt(1), receipt(2), receipt(3)]);
    }

    #[test]
    fn test_receipt_log_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipts.log");

        let log = FileReceiptLog::new(&path).unwrap();
        log.append(&receipt(1)).unwrap();
        log.close().unwrap();

        let reopened = FileReceiptLog::new(&path).unwrap();
        reopened.append(&receipt(2)).unwrap();

        let read: Vec<LedgerReceipt> = reopened.iterate().map(|r| r.unwrap()).collect();
        assert_eq!(read, vec![receipt(1), receipt(2)]);
    }

    #[test]
    fn test_empty_log_iterates_nothing() {
        let dir = tempdir().unwrap();
        let log = FileReceiptLog::new(&dir.path().join("receipts.log")).unwrap();
        assert_eq!(log.iterate().count(), 0);
    }

    #[test]
    fn test_closed_log_rejects_appends() {
        let dir = tempdir().unwrap();
        let log = FileReceiptLog::new(&dir.path().join("receipts.log")).unwrap();
        log.close().unwrap();
        assert!(log.append(&receipt(1)).is_err());
    }
}
