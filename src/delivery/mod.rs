//! Delivery sinks for classified events
//!
//! A session delivers through exactly one sink, chosen when it is wired:
//!
//! - `StreamSink`: synchronous callbacks to subscribers registered per label
//! - `LogSink`: durable append to the event log, downloaded after the session stops

mod log;
mod stream;
mod subscribers;
mod transitions;

pub use self::log::LogSink;
pub use stream::StreamSink;
pub use subscribers::{EventSubscriber, SubscriberRegistry};
pub use transitions::FallTracker;

use crate::error::PipelineError;
use crate::types::{ClassifiedEvent, LogEntry, SessionMode};

/// What happened to a delivered event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery {
    /// Pushed to this many subscribers (0 when nobody listens to the label).
    Streamed { subscribers: usize },
    /// Appended to the event log.
    Logged(LogEntry),
}

/// Common contract of the two delivery models.
pub trait DeliverySink: Send {
    fn deliver(&mut self, event: &ClassifiedEvent) -> Result<Delivery, PipelineError>;

    fn mode(&self) -> SessionMode;
}

/// The sink selected for a session. Not switchable once the session is wired.
pub enum Sink {
    Stream(StreamSink),
    Log(LogSink),
}

impl DeliverySink for Sink {
    fn deliver(&mut self, event: &ClassifiedEvent) -> Result<Delivery, PipelineError> {
        match self {
            Sink::Stream(sink) => sink.deliver(event),
            Sink::Log(sink) => sink.deliver(event),
        }
    }

    fn mode(&self) -> SessionMode {
        match self {
            Sink::Stream(sink) => sink.mode(),
            Sink::Log(sink) => sink.mode(),
        }
    }
}

impl From<StreamSink> for Sink {
    fn from(sink: StreamSink) -> Self {
        Sink::Stream(sink)
    }
}

impl From<LogSink> for Sink {
    fn from(sink: LogSink) -> Self {
        Sink::Log(sink)
    }
}
