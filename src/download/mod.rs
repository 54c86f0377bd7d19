//! Log download
//!
//! Pulls the event log off the store after a log session has stopped.
//! Download is lazy: each call to `next()` reads exactly one entry, reports
//! progress, and yields it. Entries come back in storage order with a
//! strictly decreasing remaining count that ends at 0.
//!
//! Download is non-destructive. The log stays intact until the next log
//! session clears it, so an interrupted or cancelled download can simply be
//! started again.

mod access;
mod observer;

pub use access::{DownloadGuard, LogAccess};
pub use observer::{DownloadObserver, NoopObserver, TracingObserver};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::delivery::SubscriberRegistry;
use crate::error::PipelineError;
use crate::storage::LogStore;
use crate::types::{ClassifiedEvent, Timestamp};

/// One downloaded entry with the number of entries still to come.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadItem {
    pub event: ClassifiedEvent,
    pub entries_remaining: u32,
}

/// Result of draining a download into label handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadSummary {
    pub delivered: u32,
    pub total: u32,
    /// False when the download was cancelled before the last entry.
    pub completed: bool,
}

/// Starts downloads against a log store.
#[derive(Clone)]
pub struct LogDownloader {
    store: Arc<dyn LogStore>,
    access: LogAccess,
}

impl LogDownloader {
    pub fn new(store: Arc<dyn LogStore>, access: LogAccess) -> Self {
        Self { store, access }
    }

    /// Begin downloading every entry with `timestamp >= since`.
    ///
    /// Fails with `IllegalStateTransition` while logging is armed or another
    /// download is active. Log timestamps never decrease (ingestion rejects
    /// regressions and each log session starts from an empty log), so the
    /// first matching entry is located by binary search.
    pub fn download(
        &self,
        since: Timestamp,
        observer: Box<dyn DownloadObserver>,
        cancel: CancellationToken,
    ) -> Result<LogDownload, PipelineError> {
        let guard = self.access.begin_download()?;

        let len = self.store.len();
        let first = partition_point(self.store.as_ref(), since, len).map_err(|reason| {
            PipelineError::DownloadInterrupted {
                delivered: 0,
                total: 0,
                reason,
            }
        })?;

        let total = u32::try_from(len - first).unwrap_or(u32::MAX);
        if since > 0 {
            debug!(since, skipped = first, total, "Download starts mid-log");
        }

        Ok(LogDownload {
            store: Arc::clone(&self.store),
            observer,
            cancel,
            _guard: guard,
            next_sequence: first,
            total,
            delivered: 0,
            finished: false,
        })
    }
}

/// First sequence whose timestamp is `>= since`, or `len` when none is.
fn partition_point(store: &dyn LogStore, since: Timestamp, len: u64) -> Result<u64, String> {
    if since == 0 {
        return Ok(0);
    }
    let (mut lo, mut hi) = (0u64, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let entry = store
            .get(mid)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("entry {mid} missing from log"))?;
        if entry.event.timestamp < since {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Lazy, observable, cancellable sequence of log entries.
///
/// Yields `Ok(DownloadItem)` per entry. A storage failure yields one
/// `Err(DownloadInterrupted)` and then the sequence ends; `on_complete` is
/// not called in that case. Once the cancellation token fires nothing
/// further is yielded.
pub struct LogDownload {
    store: Arc<dyn LogStore>,
    observer: Box<dyn DownloadObserver>,
    cancel: CancellationToken,
    _guard: DownloadGuard,
    next_sequence: u64,
    total: u32,
    delivered: u32,
    finished: bool,
}

impl LogDownload {
    /// Entries selected for this download.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Deliver every remaining entry to the handlers registered for its label.
    pub fn drain_into(mut self, registry: &SubscriberRegistry) -> Result<DownloadSummary, PipelineError> {
        for item in self.by_ref() {
            registry.dispatch(&item?.event);
        }
        Ok(DownloadSummary {
            delivered: self.delivered,
            total: self.total,
            completed: self.delivered == self.total,
        })
    }

    fn interrupt(&mut self, reason: String) -> PipelineError {
        self.finished = true;
        warn!(
            delivered = self.delivered,
            total = self.total,
            reason = %reason,
            "Log download interrupted"
        );
        PipelineError::DownloadInterrupted {
            delivered: self.delivered,
            total: self.total,
            reason,
        }
    }
}

impl Iterator for LogDownload {
    type Item = Result<DownloadItem, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.cancel.is_cancelled() {
            self.finished = true;
            debug!(delivered = self.delivered, total = self.total, "Log download cancelled");
            return None;
        }

        if self.total == 0 {
            self.finished = true;
            self.observer.on_progress(0, 0);
            self.observer.on_complete();
            return None;
        }

        let sequence = self.next_sequence;
        let entry = match self.store.get(sequence) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Some(Err(self.interrupt(format!("entry {sequence} missing from log")))),
            Err(e) => return Some(Err(self.interrupt(e.to_string()))),
        };

        self.next_sequence += 1;
        self.delivered += 1;
        let entries_remaining = self.total - self.delivered;

        self.observer.on_progress(entries_remaining, self.total);
        if entries_remaining == 0 {
            self.finished = true;
            self.observer.on_complete();
        }

        Some(Ok(DownloadItem {
            event: entry.event,
            entries_remaining,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let left = (self.total - self.delivered) as usize;
        (0, Some(left))
    }
}

impl std::fmt::Debug for LogDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDownload")
            .field("backend", &self.store.backend_name())
            .field("next_sequence", &self.next_sequence)
            .field("delivered", &self.delivered)
            .field("total", &self.total)
            .field("finished", &self.finished)
            .finish()
    }
}
