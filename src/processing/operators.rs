//! Stream operators: RSS magnitude, moving average and threshold
//!
//! ```text
//! Sample(x, y, z) ──► Rss ──► MovingAverage(N) ──► Threshold(level)
//!                     |v|      mean of last N       ±1 or pass-through
//! ```
//!
//! All operators are deterministic and own their state. Nothing here does
//! I/O or fails; malformed samples are filtered before they get this far.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{AveragedMagnitude, Magnitude, Sample, ThresholdSignal};

// ============================================================================
// RSS
// ============================================================================

/// Root-sum-square of the three axes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rss;

impl Rss {
    pub fn apply(self, sample: &Sample) -> Magnitude {
        sample.magnitude()
    }
}

// ============================================================================
// Moving Average
// ============================================================================

/// Arithmetic mean over a fixed window of the most recent values.
///
/// Emits nothing while the window fills; after that, one output per input.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<f32>,
    size: usize,
}

impl MovingAverage {
    /// Create an average over `size` values. A size of 0 is treated as 1.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            window: VecDeque::with_capacity(size),
            size,
        }
    }

    /// Add a value and return the mean of the last `size` values.
    ///
    /// The first `size` values only fill the window. Output starts with the
    /// value at index `size`, so the first emitted mean is over indices
    /// `1..=size`.
    pub fn push(&mut self, value: f32) -> Option<f32> {
        let was_full = self.is_full();
        if was_full {
            self.window.pop_front();
        }
        self.window.push_back(value);

        if !was_full {
            return None;
        }
        Some(self.window.iter().sum::<f32>() / self.size as f32)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.size
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

// ============================================================================
// Threshold
// ============================================================================

/// How a value exactly equal to the threshold level is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// `value >= level` is above.
    #[default]
    Inclusive,
    /// `value > level` is above; the level itself is below.
    Exclusive,
}

/// What the threshold operator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOutputMode {
    /// +1 above the level, -1 below.
    #[default]
    Binary,
    /// The input value, unchanged.
    Absolute,
}

/// Values an operator can emit, used to check downstream branch coverage.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputRange {
    /// A finite set of values.
    Discrete(Vec<f32>),
    /// Any real value.
    Continuous,
}

/// Compares the averaged magnitude against a fixed level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    level: f32,
    boundary: Boundary,
    mode: ThresholdOutputMode,
}

impl Threshold {
    pub const fn new(level: f32, boundary: Boundary, mode: ThresholdOutputMode) -> Self {
        Self {
            level,
            boundary,
            mode,
        }
    }

    /// Binary threshold with an inclusive boundary.
    pub const fn binary(level: f32) -> Self {
        Self::new(level, Boundary::Inclusive, ThresholdOutputMode::Binary)
    }

    pub const fn level(&self) -> f32 {
        self.level
    }

    pub const fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub const fn mode(&self) -> ThresholdOutputMode {
        self.mode
    }

    /// True when `value` is on the upper side of the level.
    pub fn is_above(&self, value: f32) -> bool {
        match self.boundary {
            Boundary::Inclusive => value >= self.level,
            Boundary::Exclusive => value > self.level,
        }
    }

    pub fn apply(&self, value: AveragedMagnitude) -> ThresholdSignal {
        match self.mode {
            ThresholdOutputMode::Binary if self.is_above(value) => ThresholdSignal::ABOVE,
            ThresholdOutputMode::Binary => ThresholdSignal::BELOW,
            ThresholdOutputMode::Absolute => ThresholdSignal(value),
        }
    }

    /// Every value [`Threshold::apply`] can return.
    pub fn output_range(&self) -> OutputRange {
        match self.mode {
            ThresholdOutputMode::Binary => OutputRange::Discrete(vec![
                ThresholdSignal::BELOW.value(),
                ThresholdSignal::ABOVE.value(),
            ]),
            ThresholdOutputMode::Absolute => OutputRange::Continuous,
        }
    }
}

// ============================================================================
// Operator Chain
// ============================================================================

/// RSS followed by a moving average, fixed at construction.
#[derive(Debug, Clone)]
pub struct OperatorChain {
    rss: Rss,
    average: MovingAverage,
    rate_hz: f32,
}

impl OperatorChain {
    pub fn new(window_size: usize, rate_hz: f32) -> Self {
        Self {
            rss: Rss,
            average: MovingAverage::new(window_size),
            rate_hz,
        }
    }

    /// Feed one sample. Returns the averaged magnitude from index N onward.
    pub fn push(&mut self, sample: &Sample) -> Option<AveragedMagnitude> {
        let magnitude = self.rss.apply(sample);
        self.average.push(magnitude)
    }

    pub fn window_size(&self) -> usize {
        self.average.size()
    }

    pub fn rate_hz(&self) -> f32 {
        self.rate_hz
    }

    /// Time covered by one full window at the nominal rate (ms).
    pub fn window_duration_ms(&self) -> f32 {
        if self.rate_hz > 0.0 {
            self.average.size() as f32 * 1000.0 / self.rate_hz
        } else {
            0.0
        }
    }

    pub fn is_warm(&self) -> bool {
        self.average.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_with_magnitude(i: u64, m: f32) -> Sample {
        Sample::new(i * 20, 0.0, 0.0, m)
    }

    #[test]
    fn test_moving_average_warm_up() {
        let mut avg = MovingAverage::new(4);
        assert_eq!(avg.push(1.0), None);
        assert_eq!(avg.push(2.0), None);
        assert_eq!(avg.push(3.0), None);
        assert_eq!(avg.push(4.0), None);
        assert!(avg.is_full());
        // Oldest value (1.0) leaves the window
        assert_eq!(avg.push(5.0), Some(3.5));
        assert_eq!(avg.push(6.0), Some(4.5));
        assert_eq!(avg.len(), 4);
    }

    #[test]
    fn test_moving_average_never_exceeds_window() {
        let mut avg = MovingAverage::new(3);
        for i in 0..100 {
            avg.push(i as f32);
            assert!(avg.len() <= 3);
        }
    }

    #[test]
    fn test_moving_average_zero_size_is_one() {
        let mut avg = MovingAverage::new(0);
        assert_eq!(avg.size(), 1);
        assert_eq!(avg.push(7.0), None);
        assert_eq!(avg.push(9.0), Some(9.0));
    }

    #[test]
    fn test_chain_first_output_at_index_n() {
        for window in 1..=8usize {
            let mut chain = OperatorChain::new(window, 50.0);
            for i in 0..(window as u64 * 3) {
                let out = chain.push(&sample_with_magnitude(i, 1.0));
                if (i as usize) < window {
                    assert!(out.is_none(), "window {window}: unexpected output at {i}");
                } else {
                    assert!(out.is_some(), "window {window}: missing output at {i}");
                }
            }
        }
    }

    #[test]
    fn test_threshold_boundary_inclusive() {
        let t = Threshold::new(0.5, Boundary::Inclusive, ThresholdOutputMode::Binary);
        assert_eq!(t.apply(0.5), ThresholdSignal::ABOVE);
        assert_eq!(t.apply(0.4999), ThresholdSignal::BELOW);
        assert_eq!(t.apply(1.0), ThresholdSignal::ABOVE);
    }

    #[test]
    fn test_threshold_boundary_exclusive() {
        let t = Threshold::new(0.5, Boundary::Exclusive, ThresholdOutputMode::Binary);
        assert_eq!(t.apply(0.5), ThresholdSignal::BELOW);
        assert_eq!(t.apply(0.5001), ThresholdSignal::ABOVE);
    }

    #[test]
    fn test_threshold_absolute_passes_value() {
        let t = Threshold::new(0.5, Boundary::Inclusive, ThresholdOutputMode::Absolute);
        assert_eq!(t.apply(0.73), ThresholdSignal(0.73));
        assert_eq!(t.output_range(), OutputRange::Continuous);
    }

    #[test]
    fn test_binary_output_range() {
        assert_eq!(
            Threshold::binary(0.5).output_range(),
            OutputRange::Discrete(vec![-1.0, 1.0])
        );
    }

    #[test]
    fn test_window_duration() {
        let chain = OperatorChain::new(4, 50.0);
        assert!((chain.window_duration_ms() - 80.0).abs() < 1e-3);
    }
}
