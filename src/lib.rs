//! Freefall Monitor: accelerometer free-fall detection
//!
//! Turns a stream of 3-axis accelerometer samples into labeled free-fall
//! events and delivers them either live to subscribers or into a durable
//! on-device log for later download.
//!
//! ## Architecture
//!
//! - **Processing**: RSS magnitude, moving average, threshold, two-way classifier
//! - **Delivery**: stream sink (callbacks per label) or log sink (durable append)
//! - **Download**: lazy, observable, cancellable read-back of the event log
//! - **Controller**: link-state machine that arms and disarms the session,
//!   driven through a serialized actor handle

pub mod config;
pub mod controller;
pub mod delivery;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod processing;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::FreefallConfig;

// Re-export commonly used types
pub use types::{
    Capability, ClassifiedEvent, Label, LogEntry, Sample, SessionMode, ThresholdSignal, Timestamp,
};

pub use error::{PipelineError, SampleRejection};

// Re-export the control surface
pub use controller::{
    spawn_controller, ConnectionController, ControllerHandle, ControllerStats, Link, SimulatedLink,
};

// Re-export delivery and download
pub use delivery::{DeliverySink, SubscriberRegistry};
pub use download::{DownloadItem, DownloadObserver, LogDownload, LogDownloader, TracingObserver};

// Re-export storage
pub use storage::{open_log_store, LogStore, StorageError};

pub use pipeline::{PipelineCoordinator, PipelineStats, SampleOutcome};
