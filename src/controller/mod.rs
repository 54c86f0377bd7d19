//! Connection Controller - gates the pipeline on link state
//!
//! ```text
//!   Disconnected ──request_link──▶ Connecting ──link_established──▶ Connected(session)
//!        ▲                             │                                  │
//!        └─────── capability missing ──┘          stop / drop / reset ────┘
//! ```
//!
//! Samples are processed only while Connected with an armed session. Every
//! transition runs to completion before the next call is handled; the
//! [`actor`] module serializes concurrent callers onto one task.

pub mod actor;
mod link;

pub use actor::{spawn_controller, ControllerActor, ControllerCommand, ControllerHandle};
pub use link::{Link, SimulatedLink};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::FreefallConfig;
use crate::delivery::{LogSink, Sink, StreamSink, SubscriberRegistry};
use crate::download::{DownloadObserver, LogAccess, LogDownload, LogDownloader};
use crate::error::PipelineError;
use crate::pipeline::{PipelineCoordinator, PipelineStats, SampleOutcome};
use crate::storage::LogStore;
use crate::types::{Capability, Sample, SessionMode, Timestamp};

// ============================================================================
// State
// ============================================================================

/// The single active session, created on link-up and destroyed on teardown.
pub struct PipelineSession {
    mode: SessionMode,
    armed: bool,
    started_at: DateTime<Utc>,
    pipeline: PipelineCoordinator,
}

impl PipelineSession {
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.get_stats()
    }
}

pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(PipelineSession),
}

impl ConnectionState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected(_) => "connected",
        }
    }
}

/// Snapshot of controller state for status output.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStats {
    pub state: &'static str,
    pub mode: SessionMode,
    pub armed: bool,
    /// Samples that arrived with no armed session
    pub samples_dropped: u64,
    pub session_started: Option<DateTime<Utc>>,
    /// Counters of the active session, or of the last one if none is active
    pub session: Option<PipelineStats>,
}

impl std::fmt::Display for ControllerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Controller: {} ({} mode, armed={}), {} dropped",
            self.state, self.mode, self.armed, self.samples_dropped
        )?;
        if let Some(session) = &self.session {
            write!(f, " | {session}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct ConnectionController {
    config: FreefallConfig,
    link: Box<dyn Link>,
    store: Arc<dyn LogStore>,
    registry: SubscriberRegistry,
    access: LogAccess,
    state: ConnectionState,
    /// Mode the next session is wired with
    mode: SessionMode,
    samples_dropped: u64,
    last_session: Option<(DateTime<Utc>, PipelineStats)>,
}

impl ConnectionController {
    pub fn new(
        config: FreefallConfig,
        link: Box<dyn Link>,
        store: Arc<dyn LogStore>,
        registry: SubscriberRegistry,
    ) -> Self {
        let mode = config.pipeline.mode;
        Self {
            config,
            link,
            store,
            registry,
            access: LogAccess::new(),
            state: ConnectionState::Disconnected,
            mode,
            samples_dropped: 0,
            last_session: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_armed(&self) -> bool {
        matches!(&self.state, ConnectionState::Connected(s) if s.armed)
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Link events
    // ------------------------------------------------------------------------

    /// Disconnected → Connecting.
    pub fn request_link(&mut self) -> Result<(), PipelineError> {
        match self.state {
            ConnectionState::Disconnected => {
                self.state = ConnectionState::Connecting;
                info!(address = %self.link.address(), mode = %self.mode, "Connecting");
                Ok(())
            }
            ref other => Err(PipelineError::illegal(other.name(), "request the link")),
        }
    }

    /// Connecting → Connected: wire and arm a session for the current mode.
    ///
    /// If wiring fails the controller falls back to Disconnected and the
    /// error is returned; the attempt never ends up half-connected.
    pub fn link_established(&mut self) -> Result<(), PipelineError> {
        if !matches!(self.state, ConnectionState::Connecting) {
            return Err(PipelineError::illegal(self.state.name(), "complete the link"));
        }

        match self.wire_session() {
            Ok(session) => {
                if session.mode == SessionMode::Log {
                    self.access.arm();
                }
                info!(
                    address = %self.link.address(),
                    mode = %session.mode,
                    window = session.pipeline.chain().window_size(),
                    "Connected, session armed"
                );
                self.state = ConnectionState::Connected(session);
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                error!(address = %self.link.address(), mode = %self.mode, error = %e, "Session wiring failed");
                Err(e)
            }
        }
    }

    fn wire_session(&self) -> Result<PipelineSession, PipelineError> {
        if let Some(missing) = self
            .mode
            .required_capabilities()
            .iter()
            .find(|cap| !self.link.supports(**cap))
        {
            return Err(PipelineError::CapabilityUnavailable(*missing));
        }

        let sink = match self.mode {
            SessionMode::Stream => Sink::from(StreamSink::new(self.registry.clone())),
            SessionMode::Log => {
                // A new log session replaces the previous log
                self.store
                    .clear()
                    .map_err(|e| PipelineError::AppendFailed(e.to_string()))?;
                Sink::from(LogSink::new(Arc::clone(&self.store)))
            }
        };

        Ok(PipelineSession {
            mode: self.mode,
            armed: true,
            started_at: Utc::now(),
            pipeline: PipelineCoordinator::new(&self.config, sink)?,
        })
    }

    /// Link lost. Accepted in every state; tears down any session.
    pub fn link_dropped(&mut self) {
        match self.state {
            ConnectionState::Disconnected => debug!("Link drop while already disconnected"),
            ConnectionState::Connecting => info!("Link dropped while connecting"),
            ConnectionState::Connected(_) => warn!("Link dropped, session torn down"),
        }
        self.teardown();
    }

    // ------------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------------

    /// Record the mode for the next session and request the link.
    ///
    /// A log session is refused while a previous log is still being
    /// downloaded, since arming it would clear the log under the reader.
    pub fn start_session(&mut self, mode: SessionMode) -> Result<(), PipelineError> {
        if !matches!(self.state, ConnectionState::Disconnected) {
            return Err(PipelineError::illegal(self.state.name(), "start a session"));
        }
        if mode == SessionMode::Log && self.access.is_downloading() {
            return Err(PipelineError::illegal("downloading", "start a log session"));
        }
        self.mode = mode;
        self.request_link()
    }

    /// Connected → Disconnected. The log is flushed but not downloaded.
    pub fn stop_session(&mut self) -> Result<(), PipelineError> {
        if !matches!(self.state, ConnectionState::Connected(_)) {
            return Err(PipelineError::illegal(self.state.name(), "stop the session"));
        }
        self.teardown();
        info!("Session stopped");
        Ok(())
    }

    /// Reset the board and return to Disconnected.
    ///
    /// If the board refuses the reset the session is left as it was.
    pub fn reset_link(&mut self) -> Result<(), PipelineError> {
        if !self.link.supports(Capability::Reset) {
            return Err(PipelineError::CapabilityUnavailable(Capability::Reset));
        }
        self.link.reset()?;
        self.teardown();
        info!(address = %self.link.address(), "Link reset");
        Ok(())
    }

    fn teardown(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        let ConnectionState::Connected(mut session) = previous else {
            return;
        };

        session.armed = false;
        self.access.disarm();

        if session.mode == SessionMode::Log {
            if let Err(e) = self.store.flush() {
                error!(error = %e, "Failed to flush event log");
            }
        }

        let stats = session.pipeline.get_stats();
        info!(mode = %session.mode, "{}", stats);
        self.last_session = Some((session.started_at, stats));
    }

    // ------------------------------------------------------------------------
    // Processing path
    // ------------------------------------------------------------------------

    /// Feed one sample to the armed session.
    ///
    /// Without an armed session the sample is dropped. A failed log append
    /// disarms the session (it stays Connected) and returns the error.
    pub fn ingest(&mut self, sample: &Sample) -> Result<SampleOutcome, PipelineError> {
        let session = match &mut self.state {
            ConnectionState::Connected(session) if session.armed => session,
            _ => {
                self.samples_dropped += 1;
                return Ok(SampleOutcome::Dropped);
            }
        };

        match session.pipeline.process_sample(sample) {
            Err(e @ (PipelineError::StorageFull { .. } | PipelineError::AppendFailed(_))) => {
                session.armed = false;
                self.access.disarm();
                error!(error = %e, "Logging disarmed");
                Err(e)
            }
            other => other,
        }
    }

    // ------------------------------------------------------------------------
    // Download
    // ------------------------------------------------------------------------

    pub fn downloader(&self) -> LogDownloader {
        LogDownloader::new(Arc::clone(&self.store), self.access.clone())
    }

    /// Start a log download. Refused while any session is armed.
    pub fn download(
        &self,
        since: Timestamp,
        observer: Box<dyn DownloadObserver>,
        cancel: CancellationToken,
    ) -> Result<LogDownload, PipelineError> {
        if self.is_armed() {
            return Err(PipelineError::illegal("armed", "download the log"));
        }
        self.downloader().download(since, observer, cancel)
    }

    pub fn stats(&self) -> ControllerStats {
        let (session_started, session) = match &self.state {
            ConnectionState::Connected(s) => (Some(s.started_at), Some(s.stats())),
            _ => self
                .last_session
                .map_or((None, None), |(at, stats)| (Some(at), Some(stats))),
        };
        ControllerStats {
            state: self.state.name(),
            mode: self.mode,
            armed: self.is_armed(),
            samples_dropped: self.samples_dropped,
            session_started,
            session,
        }
    }
}
