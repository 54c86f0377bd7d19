//! Synthetic drop scenario
//!
//! Generates accelerometer readings for a board that rests, falls, hits the
//! ground and settles again. Used by the `simulation` binary and by the
//! synthetic sample source.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::types::Sample;

/// Phase of the drop the scenario is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPhase {
    Rest,
    FreeFall,
    Impact,
    Settled,
}

/// Phase durations and noise for one drop.
#[derive(Debug, Clone)]
pub struct DropScenario {
    pub rate_hz: f32,
    pub rest_ms: u64,
    pub fall_ms: u64,
    pub impact_ms: u64,
    pub settle_ms: u64,
    /// Peak magnitude at impact (g)
    pub impact_peak_g: f32,
    /// Standard deviation of per-axis noise (g)
    pub noise_g: f32,
    pub seed: Option<u64>,
}

impl Default for DropScenario {
    fn default() -> Self {
        Self {
            rate_hz: crate::config::defaults::SAMPLE_RATE_HZ,
            rest_ms: 1_000,
            fall_ms: 400,
            impact_ms: 100,
            settle_ms: 1_000,
            impact_peak_g: 6.0,
            noise_g: 0.02,
            seed: None,
        }
    }
}

impl DropScenario {
    pub fn duration_ms(&self) -> u64 {
        self.rest_ms + self.fall_ms + self.impact_ms + self.settle_ms
    }

    fn period_ms(&self) -> f64 {
        if self.rate_hz > 0.0 {
            1000.0 / f64::from(self.rate_hz)
        } else {
            1000.0
        }
    }

    pub fn sample_count(&self) -> u64 {
        (self.duration_ms() as f64 / self.period_ms()).floor() as u64
    }

    pub fn phase_at(&self, t_ms: u64) -> DropPhase {
        if t_ms < self.rest_ms {
            DropPhase::Rest
        } else if t_ms < self.rest_ms + self.fall_ms {
            DropPhase::FreeFall
        } else if t_ms < self.rest_ms + self.fall_ms + self.impact_ms {
            DropPhase::Impact
        } else {
            DropPhase::Settled
        }
    }

    /// Iterate the scenario's samples, timestamps starting at 0.
    pub fn samples(&self) -> DropSamples {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        // Normal::new only fails on a negative or NaN std-dev
        let noise = Normal::new(0.0, f64::from(self.noise_g.abs())).ok();
        DropSamples {
            scenario: self.clone(),
            index: 0,
            count: self.sample_count(),
            rng,
            noise,
        }
    }
}

/// Iterator over a scenario's samples.
pub struct DropSamples {
    scenario: DropScenario,
    index: u64,
    count: u64,
    rng: StdRng,
    noise: Option<Normal<f64>>,
}

impl DropSamples {
    fn jitter(&mut self) -> f32 {
        self.noise
            .as_ref()
            .map_or(0.0, |n| n.sample(&mut self.rng) as f32)
    }
}

impl Iterator for DropSamples {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.index >= self.count {
            return None;
        }
        let t_ms = (self.index as f64 * self.scenario.period_ms()).round() as u64;
        self.index += 1;

        // Gravity on z while supported, nothing while falling, a decaying spike on impact
        let z = match self.scenario.phase_at(t_ms) {
            DropPhase::Rest | DropPhase::Settled => 1.0,
            DropPhase::FreeFall => 0.0,
            DropPhase::Impact => {
                let start = self.scenario.rest_ms + self.scenario.fall_ms;
                let progress = (t_ms - start) as f32 / self.scenario.impact_ms.max(1) as f32;
                1.0 + (self.scenario.impact_peak_g - 1.0) * (1.0 - progress)
            }
        };

        let (dx, dy, dz) = (self.jitter(), self.jitter(), self.jitter());
        Some(Sample::new(t_ms, dx, dy, z + dz))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.count - self.index).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}
