//! Signal processing: operator chain, classifier and ingestion checks

mod classifier;
mod operators;
mod validation;

pub use classifier::{check_topology, Branch, Classifier, CompareOp, Comparison};
pub use operators::{
    Boundary, MovingAverage, OperatorChain, OutputRange, Rss, Threshold, ThresholdOutputMode,
};
pub use validation::SampleValidator;
