//! Controller Actor - serializes control commands and samples onto one task
//!
//! The UI control surface (start, stop, reset), link events and the
//! processing loop all talk to the controller through a
//! [`ControllerHandle`]. Commands are handled one at a time in arrival
//! order, so a transition always completes before the next one starts and
//! samples keep their FIFO order.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ConnectionController, ControllerStats};
use crate::config::defaults::COMMAND_CHANNEL_CAPACITY;
use crate::download::{DownloadObserver, LogDownload};
use crate::error::PipelineError;
use crate::pipeline::SampleOutcome;
use crate::types::{Sample, SessionMode, Timestamp};

type Reply<T> = oneshot::Sender<Result<T, PipelineError>>;

// ============================================================================
// Commands
// ============================================================================

/// Commands for ControllerActor
pub enum ControllerCommand {
    StartSession {
        mode: SessionMode,
        response_tx: Reply<()>,
    },
    StopSession {
        response_tx: Reply<()>,
    },
    ResetLink {
        response_tx: Reply<()>,
    },
    /// Link bring-up requested by the transport
    RequestLink {
        response_tx: Reply<()>,
    },
    LinkEstablished {
        response_tx: Reply<()>,
    },
    LinkDropped {
        response_tx: oneshot::Sender<()>,
    },
    Ingest {
        sample: Sample,
        response_tx: Reply<SampleOutcome>,
    },
    Download {
        since: Timestamp,
        observer: Box<dyn DownloadObserver>,
        cancel: CancellationToken,
        response_tx: Reply<LogDownload>,
    },
    GetStats {
        response_tx: oneshot::Sender<ControllerStats>,
    },
}

impl std::fmt::Debug for ControllerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartSession { mode, .. } => write!(f, "StartSession({mode})"),
            Self::StopSession { .. } => write!(f, "StopSession"),
            Self::ResetLink { .. } => write!(f, "ResetLink"),
            Self::RequestLink { .. } => write!(f, "RequestLink"),
            Self::LinkEstablished { .. } => write!(f, "LinkEstablished"),
            Self::LinkDropped { .. } => write!(f, "LinkDropped"),
            Self::Ingest { sample, .. } => write!(f, "Ingest(t={})", sample.timestamp),
            Self::Download { since, .. } => write!(f, "Download(since={since})"),
            Self::GetStats { .. } => write!(f, "GetStats"),
        }
    }
}

// ============================================================================
// Actor Handle
// ============================================================================

/// Handle to interact with ControllerActor
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerCommand>,
}

impl ControllerHandle {
    async fn call<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> ControllerCommand,
    ) -> Result<T, PipelineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(command(response_tx))
            .await
            .map_err(|_| PipelineError::ActorUnavailable)?;
        response_rx.await.map_err(|_| PipelineError::ActorUnavailable)?
    }

    pub async fn start_session(&self, mode: SessionMode) -> Result<(), PipelineError> {
        self.call(|response_tx| ControllerCommand::StartSession { mode, response_tx })
            .await
    }

    pub async fn stop_session(&self) -> Result<(), PipelineError> {
        self.call(|response_tx| ControllerCommand::StopSession { response_tx })
            .await
    }

    pub async fn reset_link(&self) -> Result<(), PipelineError> {
        self.call(|response_tx| ControllerCommand::ResetLink { response_tx })
            .await
    }

    pub async fn request_link(&self) -> Result<(), PipelineError> {
        self.call(|response_tx| ControllerCommand::RequestLink { response_tx })
            .await
    }

    pub async fn link_established(&self) -> Result<(), PipelineError> {
        self.call(|response_tx| ControllerCommand::LinkEstablished { response_tx })
            .await
    }

    pub async fn link_dropped(&self) -> Result<(), PipelineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ControllerCommand::LinkDropped { response_tx })
            .await
            .map_err(|_| PipelineError::ActorUnavailable)?;
        response_rx.await.map_err(|_| PipelineError::ActorUnavailable)
    }

    /// Feed one sample and wait for the pipeline's verdict.
    pub async fn ingest(&self, sample: Sample) -> Result<SampleOutcome, PipelineError> {
        self.call(|response_tx| ControllerCommand::Ingest {
            sample,
            response_tx,
        })
        .await
    }

    /// Start a download. The returned iterator reads the store directly,
    /// off the actor task.
    pub async fn download(
        &self,
        since: Timestamp,
        observer: Box<dyn DownloadObserver>,
        cancel: CancellationToken,
    ) -> Result<LogDownload, PipelineError> {
        self.call(|response_tx| ControllerCommand::Download {
            since,
            observer,
            cancel,
            response_tx,
        })
        .await
    }

    pub async fn get_stats(&self) -> Result<ControllerStats, PipelineError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(ControllerCommand::GetStats { response_tx })
            .await
            .map_err(|_| PipelineError::ActorUnavailable)?;
        response_rx.await.map_err(|_| PipelineError::ActorUnavailable)
    }
}

// ============================================================================
// Controller Actor
// ============================================================================

/// Owns the controller and applies commands in order.
pub struct ControllerActor {
    controller: ConnectionController,
    rx: mpsc::Receiver<ControllerCommand>,
}

impl ControllerActor {
    /// Create new controller actor and handle
    pub fn new(controller: ConnectionController) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        (Self { controller, rx }, ControllerHandle { tx })
    }

    /// Run until every handle is dropped. Returns the controller for inspection.
    pub async fn run(mut self) -> ConnectionController {
        info!("ControllerActor starting");

        while let Some(cmd) = self.rx.recv().await {
            debug!(command = ?cmd, state = self.controller.state_name(), "Controller command");
            let c = &mut self.controller;
            match cmd {
                ControllerCommand::StartSession { mode, response_tx } => {
                    let _ = response_tx.send(c.start_session(mode));
                }
                ControllerCommand::StopSession { response_tx } => {
                    let _ = response_tx.send(c.stop_session());
                }
                ControllerCommand::ResetLink { response_tx } => {
                    let _ = response_tx.send(c.reset_link());
                }
                ControllerCommand::RequestLink { response_tx } => {
                    let _ = response_tx.send(c.request_link());
                }
                ControllerCommand::LinkEstablished { response_tx } => {
                    let _ = response_tx.send(c.link_established());
                }
                ControllerCommand::LinkDropped { response_tx } => {
                    c.link_dropped();
                    let _ = response_tx.send(());
                }
                ControllerCommand::Ingest {
                    sample,
                    response_tx,
                } => {
                    let _ = response_tx.send(c.ingest(&sample));
                }
                ControllerCommand::Download {
                    since,
                    observer,
                    cancel,
                    response_tx,
                } => {
                    let _ = response_tx.send(c.download(since, observer, cancel));
                }
                ControllerCommand::GetStats { response_tx } => {
                    let _ = response_tx.send(c.stats());
                }
            }
        }

        info!("ControllerActor stopped");
        self.controller
    }
}

/// Spawn the actor on the current runtime.
pub fn spawn_controller(
    controller: ConnectionController,
) -> (ControllerHandle, tokio::task::JoinHandle<ConnectionController>) {
    let (actor, handle) = ControllerActor::new(controller);
    (handle, tokio::spawn(actor.run()))
}
