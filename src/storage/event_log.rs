//! sled-backed event log
//!
//! Key: sequence as u64 big-endian bytes (sorts in write order)
//! Value: JSON-serialized ClassifiedEvent

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{LogStore, StorageError};
use crate::config::defaults::LOG_TREE_NAME;
use crate::types::{ClassifiedEvent, LogEntry};

/// Event log stored in a named sled tree.
#[derive(Clone)]
pub struct SledLogStore {
    db: Arc<sled::Db>,
    tree: sled::Tree,
    /// Cached entry count; `Tree::len` walks the whole tree.
    count: Arc<AtomicU64>,
    capacity: usize,
}

impl SledLogStore {
    /// Open or create the event log at the specified path
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let tree = db.open_tree(LOG_TREE_NAME)?;
        let count = tree.len() as u64;

        tracing::debug!(path = %path_ref.display(), entries = count, "sled event log opened");

        Ok(Self {
            db: Arc::new(db),
            tree,
            count: Arc::new(AtomicU64::new(count)),
            capacity,
        })
    }

    /// Database size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

impl LogStore for SledLogStore {
    /// Does not flush on each write. sled flushes in the background and the
    /// controller flushes explicitly when a session stops.
    fn append(&self, event: &ClassifiedEvent) -> Result<LogEntry, StorageError> {
        let sequence = self.count.load(Ordering::Acquire);
        if sequence >= self.capacity as u64 {
            return Err(StorageError::Full {
                capacity: self.capacity,
            });
        }

        let value = serde_json::to_vec(event)?;
        self.tree.insert(sequence.to_be_bytes(), value)?;
        self.count.store(sequence + 1, Ordering::Release);

        Ok(LogEntry {
            sequence,
            event: *event,
        })
    }

    fn get(&self, sequence: u64) -> Result<Option<LogEntry>, StorageError> {
        match self.tree.get(sequence.to_be_bytes())? {
            Some(value) => {
                let event: ClassifiedEvent = serde_json::from_slice(&value)?;
                Ok(Some(LogEntry { sequence, event }))
            }
            None => Ok(None),
        }
    }

    fn len(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.tree.clear()?;
        self.tree.flush()?;
        self.count.store(0, Ordering::Release);
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.tree.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
