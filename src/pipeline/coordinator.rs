//! Pipeline Coordinator - runs one sample through every stage
//!
//! ```text
//! Sample ─▶ validate ─▶ RSS ─▶ moving average ─▶ threshold ─▶ classify ─▶ sink
//!             │                     │                            │
//!          rejected             warming up                   unmatched
//! ```
//!
//! Stages are synchronous and run in order on the caller's task. Each
//! sample produces at most one classified event.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::FreefallConfig;
use crate::delivery::{Delivery, DeliverySink, Sink};
use crate::error::{PipelineError, SampleRejection};
use crate::processing::{Classifier, OperatorChain, SampleValidator, Threshold};
use crate::types::{ClassifiedEvent, Label, Sample, SessionMode};

/// What the pipeline did with one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// No armed session; the sample was not processed.
    Dropped,
    /// Failed ingestion checks.
    Rejected(SampleRejection),
    /// Accepted, but the averaging window is not yet full.
    WarmingUp,
    /// The threshold signal matched no classifier branch.
    Unmatched,
    /// Classified and handed to the sink.
    Delivered {
        event: ClassifiedEvent,
        delivery: Delivery,
    },
}

/// Wires validator, operator chain, classifier and sink for one session.
pub struct PipelineCoordinator {
    validator: SampleValidator,
    chain: OperatorChain,
    classifier: Classifier,
    sink: Sink,
    stats: PipelineStats,
}

impl PipelineCoordinator {
    /// Build the pipeline from config.
    ///
    /// Fails with `InvalidTopology` if the classifier branches do not
    /// partition the threshold's output range.
    pub fn new(config: &FreefallConfig, sink: Sink) -> Result<Self, PipelineError> {
        let p = &config.pipeline;
        let threshold = Threshold::new(p.threshold, p.boundary, p.output_mode);
        let classifier = Classifier::free_fall(threshold)?;
        let chain = OperatorChain::new(p.window_size, config.sensor.sample_rate_hz);

        debug!(
            window = chain.window_size(),
            window_ms = chain.window_duration_ms(),
            threshold = p.threshold,
            boundary = ?p.boundary,
            output_mode = ?p.output_mode,
            mode = %sink.mode(),
            "Pipeline wired"
        );

        Ok(Self {
            validator: SampleValidator::new(config.sensor.max_abs_g),
            chain,
            classifier,
            sink,
            stats: PipelineStats::default(),
        })
    }

    /// Run one sample through the pipeline.
    ///
    /// Rejected and unmatched samples are counted, not errors. Only a sink
    /// failure (full or failed log append) comes back as `Err`.
    pub fn process_sample(&mut self, sample: &Sample) -> Result<SampleOutcome, PipelineError> {
        self.stats.samples_received += 1;

        if let Err(rejection) = self.validator.check(sample) {
            self.stats.samples_rejected += 1;
            trace!(timestamp = sample.timestamp, reason = %rejection, "Sample rejected");
            return Ok(SampleOutcome::Rejected(rejection));
        }

        let Some(avg) = self.chain.push(sample) else {
            self.stats.warm_up_samples += 1;
            return Ok(SampleOutcome::WarmingUp);
        };
        self.stats.averages_produced += 1;

        let Some(event) = self.classifier.classify(avg, sample.timestamp) else {
            self.stats.unmatched_signals += 1;
            return Ok(SampleOutcome::Unmatched);
        };

        match self.sink.deliver(&event) {
            Ok(delivery) => {
                self.stats.record_delivery(&event, &delivery);
                Ok(SampleOutcome::Delivered { event, delivery })
            }
            Err(e) => {
                self.stats.delivery_failures += 1;
                Err(e)
            }
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.sink.mode()
    }

    pub fn chain(&self) -> &OperatorChain {
        &self.chain
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn get_stats(&self) -> PipelineStats {
        self.stats
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-session pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub samples_received: u64,
    pub samples_rejected: u64,
    /// Accepted samples consumed while the averaging window filled
    pub warm_up_samples: u64,
    pub averages_produced: u64,
    pub unmatched_signals: u64,
    pub free_fall_events: u64,
    pub no_free_fall_events: u64,
    /// Stream events that reached at least one subscriber
    pub events_streamed: u64,
    /// Stream events with no subscriber for their label
    pub events_discarded: u64,
    pub events_logged: u64,
    pub delivery_failures: u64,
}

impl PipelineStats {
    fn record_delivery(&mut self, event: &ClassifiedEvent, delivery: &Delivery) {
        match event.label {
            Label::FreeFall => self.free_fall_events += 1,
            Label::NoFreeFall => self.no_free_fall_events += 1,
        }
        match delivery {
            Delivery::Streamed { subscribers: 0 } => self.events_discarded += 1,
            Delivery::Streamed { .. } => self.events_streamed += 1,
            Delivery::Logged(_) => self.events_logged += 1,
        }
    }

    pub fn events_classified(&self) -> u64 {
        self.free_fall_events + self.no_free_fall_events
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} samples ({} rejected), {} events ({} free fall, {} no free fall), {} logged",
            self.samples_received,
            self.samples_rejected,
            self.events_classified(),
            self.free_fall_events,
            self.no_free_fall_events,
            self.events_logged
        )
    }
}
