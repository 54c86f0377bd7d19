//! Pipeline error taxonomy
//!
//! Errors that only affect a single sample (an invalid reading, an
//! unmatched signal) are counted and dropped on the processing path.
//! Errors that change session state (missing capability, full storage,
//! illegal transition, interrupted download) are returned to the caller.

use crate::types::{Capability, Timestamp};
use thiserror::Error;

/// Why a sample was rejected at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SampleRejection {
    #[error("non-finite axis value")]
    NonFinite,

    #[error("magnitude {magnitude:.3} g exceeds full scale {limit:.1} g")]
    OutOfRange { magnitude: f32, limit: f32 },

    #[error("timestamp {current} is earlier than previous sample {previous}")]
    TimestampRegression {
        previous: Timestamp,
        current: Timestamp,
    },
}

/// Errors surfaced by the pipeline, controller and downloader.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The link lacks a module the session needs. Fatal to the connection attempt.
    #[error("link does not expose the {0} capability")]
    CapabilityUnavailable(Capability),

    /// The log store rejected an append because it is full. Logging is disarmed.
    #[error("log storage full ({capacity} entries); logging disarmed")]
    StorageFull { capacity: usize },

    /// The log store rejected an append for any other reason. Logging is disarmed.
    #[error("log append failed: {0}")]
    AppendFailed(String),

    /// Storage became unreadable mid-download. Entries already delivered stand.
    #[error("download interrupted after {delivered} of {total} entries: {reason}")]
    DownloadInterrupted {
        delivered: u32,
        total: u32,
        reason: String,
    },

    /// Malformed input from the sample source.
    #[error("invalid sample: {0}")]
    InvalidSample(SampleRejection),

    /// The requested action is not allowed in the current state. Nothing changed.
    #[error("illegal state transition: cannot {action} while {state}")]
    IllegalStateTransition {
        state: &'static str,
        action: &'static str,
    },

    /// Classifier branches are not mutually exclusive or do not cover the
    /// threshold operator's output range.
    #[error("invalid pipeline topology: {0}")]
    InvalidTopology(String),

    /// The controller actor has shut down.
    #[error("controller actor is not running")]
    ActorUnavailable,
}

impl PipelineError {
    pub(crate) const fn illegal(state: &'static str, action: &'static str) -> Self {
        Self::IllegalStateTransition { state, action }
    }
}
