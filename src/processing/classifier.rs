//! Classifier: threshold signal split into two labeled branches
//!
//! The branches are fixed at construction and checked against the
//! threshold operator's reachable output range: they must be mutually
//! exclusive and together cover every value the operator can emit. A
//! topology that fails the check is rejected before any sample flows.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use super::operators::{OutputRange, Threshold, ThresholdOutputMode};
use crate::error::PipelineError;
use crate::types::{AveragedMagnitude, ClassifiedEvent, Label, ThresholdSignal, Timestamp};

// ============================================================================
// Comparison Predicates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    /// The operator matching exactly the values this one rejects.
    pub const fn complement(self) -> Self {
        match self {
            Self::Eq => Self::Neq,
            Self::Neq => Self::Eq,
            Self::Lt => Self::Gte,
            Self::Gte => Self::Lt,
            Self::Lte => Self::Gt,
            Self::Gt => Self::Lte,
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

/// `signal <op> reference`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub op: CompareOp,
    pub reference: f32,
}

impl Comparison {
    pub const fn new(op: CompareOp, reference: f32) -> Self {
        Self { op, reference }
    }

    pub const fn eq(reference: f32) -> Self {
        Self::new(CompareOp::Eq, reference)
    }

    pub fn matches(&self, value: f32) -> bool {
        let r = self.reference;
        match self.op {
            CompareOp::Eq => value == r,
            CompareOp::Neq => value != r,
            CompareOp::Lt => value < r,
            CompareOp::Lte => value <= r,
            CompareOp::Gt => value > r,
            CompareOp::Gte => value >= r,
        }
    }

    /// True when `other` matches exactly the values `self` rejects.
    pub fn is_complement_of(&self, other: &Self) -> bool {
        self.reference == other.reference && self.op == other.op.complement()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal {} {}", self.op.symbol(), self.reference)
    }
}

/// One side of the split: a predicate and the label it assigns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub predicate: Comparison,
    pub label: Label,
}

impl Branch {
    pub const fn new(predicate: Comparison, label: Label) -> Self {
        Self { predicate, label }
    }
}

// ============================================================================
// Topology Check
// ============================================================================

/// Verify that `branches` partition `range`.
///
/// Discrete ranges are checked value by value. A continuous range can only
/// be partitioned by two complementary comparisons on the same reference.
pub fn check_topology(range: &OutputRange, branches: &[Branch; 2]) -> Result<(), PipelineError> {
    let [a, b] = branches;
    if a.label == b.label {
        return Err(PipelineError::InvalidTopology(format!(
            "both branches assign {}",
            a.label
        )));
    }

    match range {
        OutputRange::Discrete(values) => {
            for &v in values {
                let hits = branches.iter().filter(|br| br.predicate.matches(v)).count();
                match hits {
                    1 => {}
                    0 => {
                        return Err(PipelineError::InvalidTopology(format!(
                            "no branch matches reachable signal {v:+}"
                        )))
                    }
                    _ => {
                        return Err(PipelineError::InvalidTopology(format!(
                            "branches overlap on reachable signal {v:+}"
                        )))
                    }
                }
            }
            Ok(())
        }
        OutputRange::Continuous => {
            if a.predicate.is_complement_of(&b.predicate) {
                Ok(())
            } else {
                Err(PipelineError::InvalidTopology(format!(
                    "'{}' and '{}' do not partition a continuous signal",
                    a.predicate, b.predicate
                )))
            }
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Threshold plus a validated two-way split.
#[derive(Debug, Clone)]
pub struct Classifier {
    threshold: Threshold,
    branches: [Branch; 2],
    unmatched: u64,
}

impl Classifier {
    pub fn new(threshold: Threshold, branches: [Branch; 2]) -> Result<Self, PipelineError> {
        check_topology(&threshold.output_range(), &branches)?;
        Ok(Self {
            threshold,
            branches,
            unmatched: 0,
        })
    }

    /// The free-fall split for the threshold's output mode.
    ///
    /// Binary: `== -1` is free fall, `== +1` is not. Absolute: below the
    /// level is free fall, at or above it (per the boundary) is not.
    pub fn free_fall(threshold: Threshold) -> Result<Self, PipelineError> {
        let branches = match threshold.mode() {
            ThresholdOutputMode::Binary => [
                Branch::new(Comparison::eq(ThresholdSignal::BELOW.value()), Label::FreeFall),
                Branch::new(Comparison::eq(ThresholdSignal::ABOVE.value()), Label::NoFreeFall),
            ],
            ThresholdOutputMode::Absolute => {
                let above = match threshold.boundary() {
                    super::Boundary::Inclusive => CompareOp::Gte,
                    super::Boundary::Exclusive => CompareOp::Gt,
                };
                [
                    Branch::new(
                        Comparison::new(above.complement(), threshold.level()),
                        Label::FreeFall,
                    ),
                    Branch::new(Comparison::new(above, threshold.level()), Label::NoFreeFall),
                ]
            }
        };
        Self::new(threshold, branches)
    }

    pub fn threshold(&self) -> &Threshold {
        &self.threshold
    }

    pub fn branches(&self) -> &[Branch; 2] {
        &self.branches
    }

    /// Signals that matched no branch. Stays at 0 for any validated topology.
    pub fn unmatched(&self) -> u64 {
        self.unmatched
    }

    pub fn signal(&self, avg: AveragedMagnitude) -> ThresholdSignal {
        self.threshold.apply(avg)
    }

    /// Label one averaged magnitude.
    ///
    /// Returns `None` only if the signal falls outside both branches, in
    /// which case it is dropped with a warning rather than mislabeled.
    pub fn classify(
        &mut self,
        avg: AveragedMagnitude,
        timestamp: Timestamp,
    ) -> Option<ClassifiedEvent> {
        let signal = self.signal(avg);
        let Some(branch) = self
            .branches
            .iter()
            .find(|b| b.predicate.matches(signal.value()))
        else {
            self.unmatched += 1;
            warn!(signal = %signal, timestamp, "Signal matched no branch, dropped");
            return None;
        };

        Some(ClassifiedEvent {
            label: branch.label,
            timestamp,
            magnitude: avg,
        })
    }
}
