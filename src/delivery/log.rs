//! Log sink: durable append in arrival order

use std::sync::Arc;
use tracing::error;

use super::{DeliverySink, Delivery};
use crate::error::PipelineError;
use crate::storage::{LogStore, StorageError};
use crate::types::{ClassifiedEvent, SessionMode};

/// Appends each event to the event log.
///
/// The first failed append disarms the sink; later events are refused with
/// the same error until a new session is wired.
pub struct LogSink {
    store: Arc<dyn LogStore>,
    armed: bool,
    appended: u64,
}

impl LogSink {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self {
            store,
            armed: true,
            appended: 0,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn appended(&self) -> u64 {
        self.appended
    }

    fn refused(&self) -> PipelineError {
        PipelineError::AppendFailed("logging disarmed after a failed append".to_string())
    }
}

impl DeliverySink for LogSink {
    fn deliver(&mut self, event: &ClassifiedEvent) -> Result<Delivery, PipelineError> {
        if !self.armed {
            return Err(self.refused());
        }

        match self.store.append(event) {
            Ok(entry) => {
                self.appended += 1;
                Ok(Delivery::Logged(entry))
            }
            Err(e) => {
                self.armed = false;
                error!(
                    backend = self.store.backend_name(),
                    appended = self.appended,
                    error = %e,
                    "Log append failed, logging disarmed"
                );
                Err(match e {
                    StorageError::Full { capacity } => PipelineError::StorageFull { capacity },
                    other => PipelineError::AppendFailed(other.to_string()),
                })
            }
        }
    }

    fn mode(&self) -> SessionMode {
        SessionMode::Log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryLogStore;
    use crate::types::Label;

    fn event(ts: u64) -> ClassifiedEvent {
        ClassifiedEvent {
            label: Label::FreeFall,
            timestamp: ts,
            magnitude: 0.2,
        }
    }

    #[test]
    fn test_appends_in_arrival_order() {
        let store = Arc::new(InMemoryLogStore::new(10));
        let mut sink = LogSink::new(store.clone());
        for ts in [10, 20, 30] {
            sink.deliver(&event(ts)).expect("append");
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(2).expect("read").map(|e| e.event.timestamp), Some(30));
        assert_eq!(sink.appended(), 3);
    }

    #[test]
    fn test_full_storage_disarms() {
        let store = Arc::new(InMemoryLogStore::new(1));
        let mut sink = LogSink::new(store.clone());
        sink.deliver(&event(0)).expect("first fits");

        assert_eq!(
            sink.deliver(&event(20)),
            Err(PipelineError::StorageFull { capacity: 1 })
        );
        assert!(!sink.is_armed());
        assert!(matches!(sink.deliver(&event(40)), Err(PipelineError::AppendFailed(_))));
        assert_eq!(store.len(), 1);
    }
}
