//! Sample source abstraction for accelerometer ingestion.
//!
//! Provides a unified trait for reading samples from different sources:
//! pre-loaded replays, stdin (JSON lines), and the synthetic drop scenario.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use super::scenario::{DropSamples, DropScenario};
use crate::types::Sample;

/// Events produced by a sample source.
pub enum SampleEvent {
    /// A reading was produced.
    Sample(Sample),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where accelerometer samples come from.
///
/// The processing loop calls [`configure`](SampleSource::configure) and
/// [`start`](SampleSource::start) once, then [`next_sample`](SampleSource::next_sample)
/// in a select! with cancellation, then [`stop`](SampleSource::stop).
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Set the output data rate (Hz). Paced sources wait one period between samples.
    fn configure(&mut self, rate_hz: f32);

    async fn start(&mut self) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Read the next sample.
    ///
    /// Returns `SampleEvent::Eof` when no more data is available.
    async fn next_sample(&mut self) -> Result<SampleEvent>;

    /// Human-readable name for logging (e.g. "replay", "stdin").
    fn source_name(&self) -> &str;
}

/// Delay between samples at `rate_hz`, compressed by `speed`. Zero disables pacing.
fn pacing(rate_hz: f32, speed: f32) -> Duration {
    if rate_hz > 0.0 && speed > 0.0 {
        Duration::from_secs_f64(1.0 / (f64::from(rate_hz) * f64::from(speed)))
    } else {
        Duration::ZERO
    }
}

// ============================================================================
// Replay Source
// ============================================================================

/// Replays pre-loaded samples, optionally paced at the configured rate.
pub struct ReplaySource {
    samples: std::vec::IntoIter<Sample>,
    speed: f32,
    delay: Duration,
    yielded_first: bool,
}

impl ReplaySource {
    /// `speed` compresses time (2.0 replays twice as fast); 0 disables pacing.
    pub fn new(samples: Vec<Sample>, speed: f32) -> Self {
        Self {
            samples: samples.into_iter(),
            speed,
            delay: Duration::ZERO,
            yielded_first: false,
        }
    }

    /// Load newline-delimited JSON samples from a file. Malformed lines are skipped.
    pub fn from_json_lines(path: &std::path::Path, speed: f32) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut samples = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Sample>(line) {
                Ok(sample) => samples.push(sample),
                Err(e) => tracing::warn!(line = line_no + 1, error = %e, "Skipping malformed sample"),
            }
        }
        tracing::info!(path = %path.display(), samples = samples.len(), "Loaded replay file");
        Ok(Self::new(samples, speed))
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    fn configure(&mut self, rate_hz: f32) {
        self.delay = pacing(rate_hz, self.speed);
    }

    async fn next_sample(&mut self) -> Result<SampleEvent> {
        if self.yielded_first && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.samples.next() {
            Some(s) => {
                self.yielded_first = true;
                Ok(SampleEvent::Sample(s))
            }
            None => Ok(SampleEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (JSON samples, one per line)
// ============================================================================

/// Reads JSON-formatted samples from stdin.
///
/// Used with the simulation harness:
/// `simulation --seed 7 | freefall-monitor --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(256),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for StdinSource {
    /// The producer on the other end of the pipe sets the pace.
    fn configure(&mut self, _rate_hz: f32) {}

    async fn next_sample(&mut self) -> Result<SampleEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SampleEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Sample>(line) {
                Ok(sample) => return Ok(SampleEvent::Sample(sample)),
                Err(e) => {
                    tracing::warn!("[StdinSource] Failed to parse sample: {}", e);
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Synthetic Source
// ============================================================================

/// Generates a drop scenario on the fly.
///
/// The scenario's own rate is replaced by the configured rate, so the
/// timestamps always match the rate the session asked for.
pub struct SyntheticSource {
    scenario: DropScenario,
    speed: f32,
    delay: Duration,
    samples: Option<DropSamples>,
}

impl SyntheticSource {
    pub fn new(scenario: DropScenario, speed: f32) -> Self {
        Self {
            scenario,
            speed,
            delay: Duration::ZERO,
            samples: None,
        }
    }
}

#[async_trait]
impl SampleSource for SyntheticSource {
    fn configure(&mut self, rate_hz: f32) {
        self.scenario.rate_hz = rate_hz;
        self.delay = pacing(rate_hz, self.speed);
    }

    async fn start(&mut self) -> Result<()> {
        self.samples = Some(self.scenario.samples());
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.samples = None;
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<SampleEvent> {
        let Some(samples) = self.samples.as_mut() else {
            anyhow::bail!("synthetic source read before start");
        };
        let next = samples.next();
        if next.is_some() && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(next.map_or(SampleEvent::Eof, SampleEvent::Sample))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}
