//! Event Log Storage
//!
//! Durable storage for classified events in log mode. Entries are keyed by
//! write sequence so they always read back in the order they were appended.
//!
//! Backends:
//! - `SledLogStore`: sled tree on disk
//! - `InMemoryLogStore`: bounded in-memory log for tests and dry runs

mod event_log;
mod memory;

pub use event_log::SledLogStore;
pub use memory::InMemoryLogStore;

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::types::{ClassifiedEvent, LogEntry};

/// Error type for log storage operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("log full ({capacity} entries)")]
    Full { capacity: usize },

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Append-only event log with sequential reads.
///
/// Sequences start at 0 after a clear and increase by one per append, so
/// `0..len()` addresses every entry. Implementations must be thread-safe:
/// the processing path appends while the downloader reads on another task
/// (never at the same time; the controller serializes the two).
pub trait LogStore: Send + Sync {
    /// Append an event, returning the stored entry with its sequence number.
    fn append(&self, event: &ClassifiedEvent) -> Result<LogEntry, StorageError>;

    /// Read the entry at `sequence`.
    fn get(&self, sequence: u64) -> Result<Option<LogEntry>, StorageError>;

    /// Number of entries currently stored.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries before appends fail with [`StorageError::Full`].
    fn capacity(&self) -> usize;

    /// Remove every entry and restart sequences at 0.
    fn clear(&self) -> Result<(), StorageError>;

    /// Make appended entries durable.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Open the backend selected in the storage config.
pub fn open_log_store(config: &StorageConfig) -> Result<Arc<dyn LogStore>, StorageError> {
    let store: Arc<dyn LogStore> = match config.backend {
        StorageBackend::Sled => Arc::new(SledLogStore::open(&config.path, config.capacity_entries)?),
        StorageBackend::Memory => Arc::new(InMemoryLogStore::new(config.capacity_entries)),
    };
    tracing::info!(
        backend = store.backend_name(),
        entries = store.len(),
        capacity = store.capacity(),
        "Event log opened"
    );
    Ok(store)
}
