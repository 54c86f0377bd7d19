//! In-memory event log for testing and dry runs
//!
//! Thread-safe via `RwLock`. Not durable: data is lost on restart.

use std::sync::RwLock;

use super::{LogStore, StorageError};
use crate::types::{ClassifiedEvent, LogEntry};

pub struct InMemoryLogStore {
    entries: RwLock<Vec<ClassifiedEvent>>,
    capacity: usize,
}

impl InMemoryLogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            capacity,
        }
    }
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new(crate::config::defaults::LOG_CAPACITY_ENTRIES)
    }
}

impl LogStore for InMemoryLogStore {
    fn append(&self, event: &ClassifiedEvent) -> Result<LogEntry, StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        if entries.len() >= self.capacity {
            return Err(StorageError::Full {
                capacity: self.capacity,
            });
        }

        let sequence = entries.len() as u64;
        entries.push(*event);
        Ok(LogEntry {
            sequence,
            event: *event,
        })
    }

    fn get(&self, sequence: u64) -> Result<Option<LogEntry>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(usize::try_from(sequence)
            .ok()
            .and_then(|i| entries.get(i))
            .map(|event| LogEntry {
                sequence,
                event: *event,
            }))
    }

    fn len(&self) -> u64 {
        self.entries.read().map(|e| e.len() as u64).unwrap_or(0)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries
            .write()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
            .clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
