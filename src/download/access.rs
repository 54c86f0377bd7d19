//! Shared arming and download flags for the event log
//!
//! Appending and downloading never overlap: a download is refused while
//! logging is armed, and the controller refuses to arm logging while a
//! download is still alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default)]
pub struct LogAccess {
    armed: Arc<AtomicBool>,
    downloading: Arc<AtomicBool>,
}

impl LogAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::SeqCst)
    }

    /// Claim the log for a download. Released when the guard drops.
    pub fn begin_download(&self) -> Result<DownloadGuard, PipelineError> {
        if self.is_armed() {
            return Err(PipelineError::illegal("armed", "download the log"));
        }
        self.downloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| PipelineError::illegal("downloading", "start a second download"))?;
        Ok(DownloadGuard {
            downloading: Arc::clone(&self.downloading),
        })
    }
}

/// Marks a download as active for as long as it lives.
#[derive(Debug)]
pub struct DownloadGuard {
    downloading: Arc<AtomicBool>,
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.downloading.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let access = LogAccess::new();
        let guard = access.begin_download().expect("first");
        assert!(access.is_downloading());
        assert!(access.begin_download().is_err());
        drop(guard);
        assert!(!access.is_downloading());
    }

    #[test]
    fn test_armed_blocks_download() {
        let access = LogAccess::new();
        access.arm();
        assert!(access.begin_download().is_err());
        access.disarm();
        assert!(access.begin_download().is_ok());
    }
}
