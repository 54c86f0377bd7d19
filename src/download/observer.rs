use tracing::info;

/// Receives download progress, once per entry and once at the end.
pub trait DownloadObserver: Send {
    /// Called after each entry with the count still to come.
    fn on_progress(&mut self, entries_remaining: u32, total_entries: u32);

    /// Called once, after the last entry (or immediately for an empty download).
    fn on_complete(&mut self);
}

/// Ignores all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {
    fn on_progress(&mut self, _entries_remaining: u32, _total_entries: u32) {}

    fn on_complete(&mut self) {}
}

/// Logs progress through `tracing`, at most `steps` times over the download.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    steps: u32,
}

impl TracingObserver {
    pub fn new(steps: u32) -> Self {
        Self { steps: steps.max(1) }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(10)
    }
}

impl DownloadObserver for TracingObserver {
    fn on_progress(&mut self, entries_remaining: u32, total_entries: u32) {
        let stride = (total_entries / self.steps).max(1);
        let done = total_entries - entries_remaining;
        if done % stride == 0 || entries_remaining == 0 {
            info!(
                entries_left = entries_remaining,
                total = total_entries,
                "Downloading log"
            );
        }
    }

    fn on_complete(&mut self) {
        info!("Log download complete");
    }
}
