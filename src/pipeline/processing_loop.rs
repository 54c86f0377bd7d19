//! Sample processing loop shared across all input sources.
//!
//! Pulls samples from a [`SampleSource`] and feeds them, in order, to the
//! controller actor until the source ends or cancellation fires.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::source::{SampleEvent, SampleSource};
use super::SampleOutcome;
use crate::controller::ControllerHandle;
use crate::error::PipelineError;

// ============================================================================
// Loop Statistics
// ============================================================================

/// Per-run counters from the loop's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub samples_read: u64,
    pub samples_dropped: u64,
    pub samples_rejected: u64,
    pub events_delivered: u64,
    pub delivery_errors: u64,
    /// True if the loop stopped because the source reached its end
    pub source_exhausted: bool,
}

impl LoopStats {
    fn record(&mut self, outcome: &SampleOutcome) {
        match outcome {
            SampleOutcome::Dropped => self.samples_dropped += 1,
            SampleOutcome::Rejected(_) => self.samples_rejected += 1,
            SampleOutcome::Delivered { .. } => self.events_delivered += 1,
            SampleOutcome::WarmingUp | SampleOutcome::Unmatched => {}
        }
    }
}

// ============================================================================
// Processing Loop
// ============================================================================

pub struct ProcessingLoop {
    controller: ControllerHandle,
    cancel_token: CancellationToken,
    rate_hz: f32,
}

impl ProcessingLoop {
    pub fn new(controller: ControllerHandle, cancel_token: CancellationToken, rate_hz: f32) -> Self {
        Self {
            controller,
            cancel_token,
            rate_hz,
        }
    }

    /// Run until the source is exhausted, fails, or the token is cancelled.
    ///
    /// The source is configured with the sensor rate and started before the
    /// first read, and stopped on the way out.
    pub async fn run<S: SampleSource>(self, source: &mut S) -> anyhow::Result<LoopStats> {
        let mut stats = LoopStats::default();

        source.configure(self.rate_hz);
        source.start().await?;

        info!(source = source.source_name(), rate_hz = self.rate_hz, "Processing samples");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break;
                }
                result = source.next_sample() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!("[ProcessingLoop] Source error: {}", e);
                            break;
                        }
                    }
                }
            };

            let sample = match event {
                SampleEvent::Sample(s) => s,
                SampleEvent::Eof => {
                    info!(samples = stats.samples_read, "[ProcessingLoop] Source reached end");
                    stats.source_exhausted = true;
                    break;
                }
            };
            stats.samples_read += 1;

            match self.controller.ingest(sample).await {
                Ok(outcome) => {
                    if let SampleOutcome::Rejected(reason) = &outcome {
                        debug!(timestamp = sample.timestamp, reason = %reason, "Invalid sample dropped");
                    }
                    stats.record(&outcome);
                }
                Err(PipelineError::ActorUnavailable) => {
                    error!("[ProcessingLoop] Controller stopped, ending loop");
                    break;
                }
                Err(e) => {
                    // Logging is disarmed; later samples are dropped by the controller
                    stats.delivery_errors += 1;
                    warn!(error = %e, "Delivery failed");
                }
            }
        }

        if let Err(e) = source.stop().await {
            warn!(error = %e, "Failed to stop source");
        }

        log_final_stats(&stats);
        Ok(stats)
    }
}

fn log_final_stats(stats: &LoopStats) {
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📊 FINAL STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Samples Read:      {}", stats.samples_read);
    info!("   Samples Dropped:   {}", stats.samples_dropped);
    info!("   Samples Rejected:  {}", stats.samples_rejected);
    info!("   Events Delivered:  {}", stats.events_delivered);
    info!("   Delivery Errors:   {}", stats.delivery_errors);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
