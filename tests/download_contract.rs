//! Log Download Contract Tests
//!
//! Progress is strictly decreasing and ends at 0, the element count equals
//! what was appended while armed, storage failure interrupts without undoing
//! delivered progress, and cancellation stops the sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use freefall_monitor::config::{StorageBackend, StorageConfig};
use freefall_monitor::controller::{ConnectionController, SimulatedLink};
use freefall_monitor::download::{DownloadObserver, LogAccess, LogDownloader};
use freefall_monitor::storage::{InMemoryLogStore, StorageError};
use freefall_monitor::{
    open_log_store, ClassifiedEvent, FreefallConfig, Label, LogEntry, LogStore, PipelineError, Sample,
    SessionMode, SubscriberRegistry,
};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Default)]
struct Progress {
    updates: Vec<(u32, u32)>,
    completed: u32,
}

#[derive(Clone, Default)]
struct RecordingObserver(Arc<Mutex<Progress>>);

impl DownloadObserver for RecordingObserver {
    fn on_progress(&mut self, entries_remaining: u32, total_entries: u32) {
        self.0
            .lock()
            .expect("lock")
            .updates
            .push((entries_remaining, total_entries));
    }

    fn on_complete(&mut self) {
        self.0.lock().expect("lock").completed += 1;
    }
}

/// Serves reads from an inner store until `fail_after` reads, then errors.
struct FlakyStore {
    inner: InMemoryLogStore,
    reads: AtomicU64,
    fail_after: AtomicU64,
}

impl LogStore for FlakyStore {
    fn append(&self, event: &ClassifiedEvent) -> Result<LogEntry, StorageError> {
        self.inner.append(event)
    }

    fn get(&self, sequence: u64) -> Result<Option<LogEntry>, StorageError> {
        if self.reads.fetch_add(1, Ordering::SeqCst) >= self.fail_after.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("flash read error".to_string()));
        }
        self.inner.get(sequence)
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.inner.clear()
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

fn log_session(controller: &mut ConnectionController, samples: u64) {
    controller.start_session(SessionMode::Log).expect("start");
    controller.link_established().expect("wire");
    for i in 0..samples {
        let z = if i % 10 < 5 { 0.05 } else { 1.0 };
        controller
            .ingest(&Sample::new(i * 20, 0.0, 0.0, z))
            .expect("ingest");
    }
    controller.stop_session().expect("stop");
}

fn event(ts: u64) -> ClassifiedEvent {
    ClassifiedEvent {
        label: Label::FreeFall,
        timestamp: ts,
        magnitude: 0.1,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn progress_counts_down_to_zero_on_sled() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let store = open_log_store(&StorageConfig {
        backend: StorageBackend::Sled,
        path: temp_dir.path().join("log.db"),
        capacity_entries: 1_000,
    })
    .expect("sled store");

    let mut controller = ConnectionController::new(
        FreefallConfig::default(),
        Box::new(SimulatedLink::full("sled")),
        Arc::clone(&store),
        SubscriberRegistry::new(),
    );
    log_session(&mut controller, 50);
    let appended = store.len();
    assert_eq!(appended, 46);

    let observer = RecordingObserver::default();
    let items: Vec<_> = controller
        .download(0, Box::new(observer.clone()), CancellationToken::new())
        .expect("download")
        .map(|item| item.expect("entry"))
        .collect();

    assert_eq!(items.len() as u64, appended);
    assert!(items
        .windows(2)
        .all(|w| w[1].entries_remaining + 1 == w[0].entries_remaining));
    assert_eq!(items.last().map(|i| i.entries_remaining), Some(0));
    assert!(items
        .windows(2)
        .all(|w| w[0].event.timestamp <= w[1].event.timestamp));

    let progress = observer.0.lock().expect("lock");
    assert_eq!(progress.updates.len(), items.len());
    assert_eq!(progress.updates.last(), Some(&(0, 46)));
    assert_eq!(progress.completed, 1);
}

#[test]
fn interrupted_download_keeps_delivered_progress() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryLogStore::new(16),
        reads: AtomicU64::new(0),
        fail_after: AtomicU64::new(3),
    });
    for ts in [0, 20, 40, 60, 80] {
        store.append(&event(ts)).expect("append");
    }

    let observer = RecordingObserver::default();
    let mut download = LogDownloader::new(store, LogAccess::new())
        .download(0, Box::new(observer.clone()), CancellationToken::new())
        .expect("download");

    for expected in [4, 3, 2] {
        let item = download.next().expect("item").expect("entry");
        assert_eq!(item.entries_remaining, expected);
    }
    match download.next() {
        Some(Err(PipelineError::DownloadInterrupted {
            delivered, total, ..
        })) => {
            assert_eq!(delivered, 3);
            assert_eq!(total, 5);
        }
        other => panic!("expected interruption, got {other:?}"),
    }
    assert!(download.next().is_none());

    let progress = observer.0.lock().expect("lock");
    assert_eq!(progress.updates, vec![(4, 5), (3, 5), (2, 5)]);
    assert_eq!(progress.completed, 0);
}

#[test]
fn interrupted_download_restarts_from_the_beginning() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryLogStore::new(16),
        reads: AtomicU64::new(0),
        fail_after: AtomicU64::new(2),
    });
    for ts in [0, 20, 40] {
        store.append(&event(ts)).expect("append");
    }
    let downloader = LogDownloader::new(store.clone(), LogAccess::new());

    let first: Vec<_> = downloader
        .download(0, Box::new(RecordingObserver::default()), CancellationToken::new())
        .expect("download")
        .collect();
    assert_eq!(first.len(), 3);
    assert!(first[2].is_err());

    // Storage recovers; the log was not consumed
    store.fail_after.store(u64::MAX, Ordering::SeqCst);
    let second: Vec<u64> = downloader
        .download(0, Box::new(RecordingObserver::default()), CancellationToken::new())
        .expect("download")
        .map(|i| i.expect("entry").event.timestamp)
        .collect();
    assert_eq!(second, vec![0, 20, 40]);
}

#[test]
fn cancellation_stops_further_yields() {
    let store = Arc::new(InMemoryLogStore::new(16));
    for ts in [0, 20, 40, 60] {
        store.append(&event(ts)).expect("append");
    }
    let cancel = CancellationToken::new();
    let observer = RecordingObserver::default();
    let mut download = LogDownloader::new(store, LogAccess::new())
        .download(0, Box::new(observer.clone()), cancel.clone())
        .expect("download");

    assert!(download.next().is_some());
    assert!(download.next().is_some());
    cancel.cancel();
    assert!(download.next().is_none());
    assert!(download.next().is_none());

    let progress = observer.0.lock().expect("lock");
    assert_eq!(progress.updates, vec![(3, 4), (2, 4)]);
    assert_eq!(progress.completed, 0);
}

#[test]
fn download_while_armed_changes_nothing() {
    let store = Arc::new(InMemoryLogStore::new(64));
    let mut controller = ConnectionController::new(
        FreefallConfig::default(),
        Box::new(SimulatedLink::full("armed")),
        store.clone(),
        SubscriberRegistry::new(),
    );
    controller.start_session(SessionMode::Log).expect("start");
    controller.link_established().expect("wire");
    for i in 0..8 {
        controller
            .ingest(&Sample::new(i * 20, 0.0, 0.0, 1.0))
            .expect("ingest");
    }
    let before = store.len();

    let result = controller.download(0, Box::new(RecordingObserver::default()), CancellationToken::new());
    assert!(matches!(
        result,
        Err(PipelineError::IllegalStateTransition { .. })
    ));
    assert_eq!(store.len(), before);
    assert!(controller.is_armed());
    assert_eq!(controller.state_name(), "connected");
}

#[test]
fn since_selects_a_suffix_of_the_log() {
    let store = Arc::new(InMemoryLogStore::new(16));
    for ts in [0, 20, 40, 60, 80, 100] {
        store.append(&event(ts)).expect("append");
    }
    let observer = RecordingObserver::default();
    let stamps: Vec<u64> = LogDownloader::new(store, LogAccess::new())
        .download(50, Box::new(observer.clone()), CancellationToken::new())
        .expect("download")
        .map(|i| i.expect("entry").event.timestamp)
        .collect();

    assert_eq!(stamps, vec![60, 80, 100]);
    assert_eq!(observer.0.lock().expect("lock").updates, vec![(2, 3), (1, 3), (0, 3)]);
}

#[test]
fn log_survives_reopen() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let storage = StorageConfig {
        backend: StorageBackend::Sled,
        path: temp_dir.path().join("log.db"),
        capacity_entries: 100,
    };

    {
        let store = open_log_store(&storage).expect("open");
        let mut controller = ConnectionController::new(
            FreefallConfig::default(),
            Box::new(SimulatedLink::full("before-restart")),
            store,
            SubscriberRegistry::new(),
        );
        log_session(&mut controller, 10);
    }

    let store = open_log_store(&storage).expect("reopen");
    let controller = ConnectionController::new(
        FreefallConfig::default(),
        Box::new(SimulatedLink::full("after-restart")),
        store,
        SubscriberRegistry::new(),
    );
    let download = controller
        .download(0, Box::new(RecordingObserver::default()), CancellationToken::new())
        .expect("download");
    assert_eq!(download.total(), 6);
}
