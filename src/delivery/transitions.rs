//! Free-fall transition logging
//!
//! Registers one handler per label. Every event is logged at debug level;
//! entering and leaving free fall are logged at info level. The same
//! handlers serve live streaming and drained log downloads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::SubscriberRegistry;
use crate::types::{Label, Timestamp};

/// Shared free-fall state updated by the registered handlers.
#[derive(Debug, Default)]
pub struct FallTracker {
    falling: AtomicBool,
    events: AtomicU64,
    falls: AtomicU64,
}

impl FallTracker {
    /// Subscribe to both labels on `registry` and return the tracker.
    pub fn register(registry: &SubscriberRegistry) -> Arc<Self> {
        let tracker = Arc::new(Self::default());

        let t = Arc::clone(&tracker);
        registry.subscribe(Label::FreeFall, move |label: Label, timestamp: Timestamp| {
            t.record(label, timestamp);
        });
        let t = Arc::clone(&tracker);
        registry.subscribe(Label::NoFreeFall, move |label: Label, timestamp: Timestamp| {
            t.record(label, timestamp);
        });

        tracker
    }

    fn record(&self, label: Label, timestamp: Timestamp) {
        self.events.fetch_add(1, Ordering::Relaxed);
        debug!(timestamp, label = %label, "Free-fall message");

        let now_falling = label == Label::FreeFall;
        let was_falling = self.falling.swap(now_falling, Ordering::Relaxed);
        match (was_falling, now_falling) {
            (false, true) => {
                self.falls.fetch_add(1, Ordering::Relaxed);
                info!(timestamp, "Entered free fall");
            }
            (true, false) => info!(timestamp, "Stopped free fall"),
            _ => {}
        }
    }

    pub fn is_falling(&self) -> bool {
        self.falling.load(Ordering::Relaxed)
    }

    /// Events seen, of either label.
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Number of times free fall was entered.
    pub fn falls(&self) -> u64 {
        self.falls.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassifiedEvent;

    fn event(label: Label, timestamp: Timestamp) -> ClassifiedEvent {
        ClassifiedEvent {
            label,
            timestamp,
            magnitude: 0.0,
        }
    }

    #[test]
    fn test_every_event_counted_transitions_once() {
        let registry = SubscriberRegistry::new();
        let tracker = FallTracker::register(&registry);

        let labels = [
            Label::NoFreeFall,
            Label::FreeFall,
            Label::FreeFall,
            Label::FreeFall,
            Label::NoFreeFall,
            Label::NoFreeFall,
            Label::FreeFall,
        ];
        for (i, label) in labels.into_iter().enumerate() {
            registry.dispatch(&event(label, i as u64 * 20));
        }

        assert_eq!(tracker.events(), 7);
        assert_eq!(tracker.falls(), 2);
        assert!(tracker.is_falling());
    }

    #[test]
    fn test_starts_not_falling() {
        let registry = SubscriberRegistry::new();
        let tracker = FallTracker::register(&registry);
        registry.dispatch(&event(Label::NoFreeFall, 0));
        assert!(!tracker.is_falling());
        assert_eq!(tracker.falls(), 0);
        assert_eq!(tracker.events(), 1);
    }
}
