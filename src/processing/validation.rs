//! Ingestion checks run before a sample reaches operator state.

use crate::error::SampleRejection;
use crate::types::{Sample, Timestamp};

/// Rejects samples the accelerometer could not have produced.
///
/// Checks, in order: every axis finite, magnitude within full scale,
/// timestamp not earlier than the previous accepted sample.
#[derive(Debug, Clone)]
pub struct SampleValidator {
    max_abs_g: f32,
    last_timestamp: Option<Timestamp>,
}

impl SampleValidator {
    pub fn new(max_abs_g: f32) -> Self {
        Self {
            max_abs_g,
            last_timestamp: None,
        }
    }

    pub fn check(&mut self, sample: &Sample) -> Result<(), SampleRejection> {
        if !sample.is_finite() {
            return Err(SampleRejection::NonFinite);
        }

        let magnitude = sample.magnitude();
        if magnitude > self.max_abs_g {
            return Err(SampleRejection::OutOfRange {
                magnitude,
                limit: self.max_abs_g,
            });
        }

        if let Some(previous) = self.last_timestamp {
            if sample.timestamp < previous {
                return Err(SampleRejection::TimestampRegression {
                    previous,
                    current: sample.timestamp,
                });
            }
        }

        self.last_timestamp = Some(sample.timestamp);
        Ok(())
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_timestamp
    }
}
