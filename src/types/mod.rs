//! Core data types for the free-fall pipeline
//!
//! Samples flow in from the accelerometer, classified events flow out to the
//! delivery sinks. Everything here is plain data: cheap to copy and
//! serde-friendly so it can be persisted in the on-device log and read from
//! JSON-lines sources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Milliseconds since the Unix epoch (or since source start for replayed data).
pub type Timestamp = u64;

/// Root-sum-square magnitude of one sample, in g.
pub type Magnitude = f32;

/// Arithmetic mean of the last N magnitudes, in g.
pub type AveragedMagnitude = f32;

// ============================================================================
// Sample
// ============================================================================

/// One triaxial accelerometer reading, in g.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Sample {
    pub const fn new(timestamp: Timestamp, x: f32, y: f32, z: f32) -> Self {
        Self { timestamp, x, y, z }
    }

    /// Root-sum-square magnitude: sqrt(x² + y² + z²).
    pub fn magnitude(&self) -> Magnitude {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// True when every axis is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ============================================================================
// Threshold Signal
// ============================================================================

/// Output of the threshold operator.
///
/// In binary mode the value is always [`ThresholdSignal::ABOVE`] or
/// [`ThresholdSignal::BELOW`]; in absolute mode it carries the averaged
/// magnitude through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ThresholdSignal(pub f32);

impl ThresholdSignal {
    pub const ABOVE: Self = Self(1.0);
    pub const BELOW: Self = Self(-1.0);

    pub const fn value(self) -> f32 {
        self.0
    }
}

impl fmt::Display for ThresholdSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Classification label. Exactly one is assigned per threshold signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    FreeFall,
    NoFreeFall,
}

impl Label {
    pub const ALL: [Self; 2] = [Self::FreeFall, Self::NoFreeFall];

    /// Route key used for subscriptions and log tagging.
    pub const fn key(self) -> &'static str {
        match self {
            Self::FreeFall => "free_fall_key",
            Self::NoFreeFall => "no_free_fall_key",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeFall => write!(f, "FreeFall"),
            Self::NoFreeFall => write!(f, "NoFreeFall"),
        }
    }
}

/// A labeled event produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub label: Label,
    pub timestamp: Timestamp,
    /// Averaged magnitude that produced the label.
    pub magnitude: AveragedMagnitude,
}

/// Persisted form of a [`ClassifiedEvent`] inside the on-device log.
///
/// `sequence` is the write order; entries are never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sequence: u64,
    pub event: ClassifiedEvent,
}

// ============================================================================
// Session Mode
// ============================================================================

/// Delivery model chosen once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Push classified events to label subscribers as they happen.
    Stream,
    /// Append classified events to durable storage for later download.
    #[default]
    Log,
}

impl SessionMode {
    /// Link capabilities a session in this mode needs before it can be wired.
    pub const fn required_capabilities(self) -> &'static [Capability] {
        match self {
            Self::Stream => &[Capability::Accelerometer, Capability::Streaming],
            Self::Log => &[Capability::Accelerometer, Capability::Logging],
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Log => write!(f, "log"),
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stream" | "streaming" => Ok(Self::Stream),
            "log" | "logging" => Ok(Self::Log),
            other => Err(format!("unknown session mode '{other}' (expected 'stream' or 'log')")),
        }
    }
}

// ============================================================================
// Link Capabilities
// ============================================================================

/// Module a link endpoint may or may not expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Accelerometer,
    Streaming,
    Logging,
    Reset,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accelerometer => write!(f, "accelerometer"),
            Self::Streaming => write!(f, "streaming"),
            Self::Logging => write!(f, "logging"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let sample = Sample::new(0, 3.0, 4.0, 0.0);
        assert!((sample.magnitude() - 5.0).abs() < 1e-6);

        let at_rest = Sample::new(0, 0.0, 0.0, 1.0);
        assert!((at_rest.magnitude() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_is_finite() {
        assert!(Sample::new(0, 0.1, 0.2, 0.3).is_finite());
        assert!(!Sample::new(0, f32::NAN, 0.2, 0.3).is_finite());
        assert!(!Sample::new(0, 0.1, f32::INFINITY, 0.3).is_finite());
    }

    #[test]
    fn test_session_mode_parse() {
        assert_eq!("stream".parse::<SessionMode>(), Ok(SessionMode::Stream));
        assert_eq!("LOG".parse::<SessionMode>(), Ok(SessionMode::Log));
        assert!("push".parse::<SessionMode>().is_err());
    }

    #[test]
    fn test_required_capabilities() {
        assert!(SessionMode::Log
            .required_capabilities()
            .contains(&Capability::Logging));
        assert!(!SessionMode::Stream
            .required_capabilities()
            .contains(&Capability::Logging));
    }

    #[test]
    fn test_label_keys_are_distinct() {
        assert_ne!(Label::FreeFall.key(), Label::NoFreeFall.key());
        assert_eq!(format!("{}", Label::FreeFall), "FreeFall");
    }
}
