//! Label-keyed subscriber registry
//!
//! Shared by the stream sink (live events) and the log downloader (drained
//! events). Subscriptions are keyed by label: a subscriber only ever sees
//! events carrying the label it registered for.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::types::{ClassifiedEvent, Label, Timestamp};

/// Callback invoked once per delivered event.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, label: Label, timestamp: Timestamp);
}

impl<F> EventSubscriber for F
where
    F: Fn(Label, Timestamp) + Send + Sync,
{
    fn on_event(&self, label: Label, timestamp: Timestamp) {
        self(label, timestamp);
    }
}

type SubscriberMap = HashMap<Label, Vec<Arc<dyn EventSubscriber>>>;

/// Cheaply cloneable handle to a shared set of subscriptions.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<SubscriberMap>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for events labeled `label`.
    pub fn subscribe<S>(&self, label: Label, subscriber: S)
    where
        S: EventSubscriber + 'static,
    {
        let mut map = self.inner.write().unwrap_or_else(|e| {
            tracing::warn!("Subscriber registry lock poisoned, recovering");
            e.into_inner()
        });
        map.entry(label).or_default().push(Arc::new(subscriber));
    }

    /// Remove every subscriber for `label`.
    pub fn unsubscribe_all(&self, label: Label) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&label);
    }

    pub fn subscriber_count(&self, label: Label) -> usize {
        self.inner
            .read()
            .map(|map| map.get(&label).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Invoke every subscriber registered for the event's label.
    ///
    /// Returns the number of callbacks invoked. The lock is released before
    /// callbacks run, so a callback may subscribe without deadlocking.
    pub fn dispatch(&self, event: &ClassifiedEvent) -> usize {
        let targets: Vec<Arc<dyn EventSubscriber>> = match self.inner.read() {
            Ok(map) => map.get(&event.label).cloned().unwrap_or_default(),
            Err(e) => e.into_inner().get(&event.label).cloned().unwrap_or_default(),
        };

        for subscriber in &targets {
            subscriber.on_event(event.label, event.timestamp);
        }
        targets.len()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("free_fall", &self.subscriber_count(Label::FreeFall))
            .field("no_free_fall", &self.subscriber_count(Label::NoFreeFall))
            .finish()
    }
}
