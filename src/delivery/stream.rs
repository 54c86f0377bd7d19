//! Stream sink: live delivery to label subscribers

use tracing::trace;

use super::{DeliverySink, Delivery, SubscriberRegistry};
use crate::error::PipelineError;
use crate::types::{ClassifiedEvent, SessionMode};

/// Pushes each event to the subscribers registered for its label.
///
/// No buffering. An event whose label has no subscribers is discarded.
pub struct StreamSink {
    registry: SubscriberRegistry,
    delivered: u64,
    discarded: u64,
}

impl StreamSink {
    pub fn new(registry: SubscriberRegistry) -> Self {
        Self {
            registry,
            delivered: 0,
            discarded: 0,
        }
    }

    /// Events that reached at least one subscriber.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Events nobody was subscribed to.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl DeliverySink for StreamSink {
    fn deliver(&mut self, event: &ClassifiedEvent) -> Result<Delivery, PipelineError> {
        let subscribers = self.registry.dispatch(event);
        if subscribers == 0 {
            self.discarded += 1;
            trace!(label = %event.label, "No subscribers, event discarded");
        } else {
            self.delivered += 1;
        }
        Ok(Delivery::Streamed { subscribers })
    }

    fn mode(&self) -> SessionMode {
        SessionMode::Stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Label, Timestamp};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_stream_sink_routes_by_label() {
        let registry = SubscriberRegistry::new();
        let seen: Arc<Mutex<Vec<(Label, Timestamp)>>> = Arc::default();
        let s = Arc::clone(&seen);
        registry.subscribe(Label::FreeFall, move |label: Label, ts: Timestamp| {
            s.lock().expect("lock").push((label, ts));
        });

        let mut sink = StreamSink::new(registry);
        let fall = ClassifiedEvent {
            label: Label::FreeFall,
            timestamp: 80,
            magnitude: 0.1,
        };
        let steady = ClassifiedEvent {
            label: Label::NoFreeFall,
            timestamp: 100,
            magnitude: 1.0,
        };

        assert_eq!(sink.deliver(&fall), Ok(Delivery::Streamed { subscribers: 1 }));
        assert_eq!(sink.deliver(&steady), Ok(Delivery::Streamed { subscribers: 0 }));

        assert_eq!(*seen.lock().expect("lock"), vec![(Label::FreeFall, 80)]);
        assert_eq!(sink.delivered(), 1);
        assert_eq!(sink.discarded(), 1);
    }
}
