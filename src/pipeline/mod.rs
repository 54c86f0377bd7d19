//! Processing Pipeline Module
//!
//! ```text
//! SampleSource ─▶ ProcessingLoop ─▶ ControllerHandle ─▶ PipelineCoordinator ─▶ Sink
//!                                    (serialized)         (per session)
//! ```
//!
//! The coordinator owns one session's validator, operator chain, classifier
//! and sink. The loop owns the source and talks to the controller actor.

mod coordinator;
pub mod processing_loop;
pub mod scenario;
pub mod source;

pub use coordinator::{PipelineCoordinator, PipelineStats, SampleOutcome};
