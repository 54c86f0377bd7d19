//! Freefall Monitor - main entry point
//!
//! Runs one detection session against a sample source and, in log mode,
//! downloads the event log once the session stops.
//!
//! # Usage
//! ```bash
//! # Synthetic drop, stream mode
//! freefall-monitor --mode stream --seed 7
//!
//! # Pipe the simulator in, log mode (the default)
//! simulation --seed 7 | freefall-monitor --stdin
//!
//! # Replay a recorded JSON-lines file at 4x
//! freefall-monitor --replay drop.jsonl --speed 4
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use freefall_monitor::config::{self, FreefallConfig, StorageBackend};
use freefall_monitor::controller::{spawn_controller, ConnectionController, SimulatedLink};
use freefall_monitor::download::TracingObserver;
use freefall_monitor::pipeline::processing_loop::ProcessingLoop;
use freefall_monitor::pipeline::scenario::DropScenario;
use freefall_monitor::pipeline::source::{ReplaySource, SampleSource, StdinSource, SyntheticSource};
use freefall_monitor::delivery::FallTracker;
use freefall_monitor::{open_log_store, ControllerHandle, SessionMode, SubscriberRegistry, Timestamp};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "freefall-monitor")]
#[command(about = "Accelerometer free-fall detection with stream and log delivery")]
#[command(version)]
struct CliArgs {
    /// Session mode: stream or log (overrides the config file)
    #[arg(long)]
    mode: Option<SessionMode>,

    /// Read JSON samples from stdin (one per line)
    #[arg(long)]
    stdin: bool,

    /// Replay a JSON-lines sample file
    #[arg(long, value_name = "PATH", conflicts_with = "stdin")]
    replay: Option<PathBuf>,

    /// Config file (default: $FREEFALL_CONFIG, then ./freefall.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Time compression for replay and synthetic input (0 = no pacing)
    #[arg(long, default_value = "1")]
    speed: f32,

    /// Seed for the synthetic drop scenario
    #[arg(long)]
    seed: Option<u64>,

    /// Download only log entries at or after this timestamp (ms)
    #[arg(long, default_value = "0")]
    since: Timestamp,

    /// Keep the event log in memory instead of the configured store
    #[arg(long)]
    memory: bool,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut freefall_config = match &args.config {
        Some(path) => FreefallConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FreefallConfig::load(),
    };
    if let Some(mode) = args.mode {
        freefall_config.pipeline.mode = mode;
    }
    if args.memory {
        freefall_config.storage.backend = StorageBackend::Memory;
    }
    config::init(freefall_config);
    let cfg = config::get();
    let mode = cfg.pipeline.mode;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Freefall Monitor");
    info!(
        "  Mode: {} | Window: {} | Threshold: {} g | Rate: {} Hz",
        mode, cfg.pipeline.window_size, cfg.pipeline.threshold, cfg.sensor.sample_rate_hz
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = open_log_store(&cfg.storage).context("Failed to open event log")?;
    let registry = SubscriberRegistry::new();
    let tracker = FallTracker::register(&registry);

    let controller = ConnectionController::new(
        cfg.clone(),
        Box::new(SimulatedLink::full(cfg.link.device_address.clone())),
        store,
        registry.clone(),
    );
    let (handle, actor_task) = spawn_controller(controller);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, stopping session...");
        shutdown_token.cancel();
    });

    // The simulated link comes up as soon as it is requested
    handle.start_session(mode).await.context("Failed to start session")?;
    handle.link_established().await.context("Failed to wire session")?;

    let rate_hz = cfg.sensor.sample_rate_hz;
    if args.stdin {
        info!("📥 Input: stdin (JSON samples)");
        run_source(&handle, cancel_token, rate_hz, StdinSource::new()).await?;
    } else if let Some(path) = &args.replay {
        info!("📥 Input: replay of {}", path.display());
        let source = ReplaySource::from_json_lines(path, args.speed)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        run_source(&handle, cancel_token, rate_hz, source).await?;
    } else {
        info!("📥 Input: synthetic drop scenario");
        let scenario = DropScenario {
            seed: args.seed,
            ..DropScenario::default()
        };
        run_source(&handle, cancel_token, rate_hz, SyntheticSource::new(scenario, args.speed)).await?;
    }

    if let Err(e) = handle.stop_session().await {
        warn!(error = %e, "Session was not running at shutdown");
    }

    if mode == SessionMode::Log {
        download_log(&handle, &registry, args.since).await?;
    }

    let stats = handle.get_stats().await?;
    info!("{}", stats);
    info!(events = tracker.events(), falls = tracker.falls(), "Free-fall summary");

    drop(handle);
    actor_task.await.context("Controller task failed")?;

    info!("✓ Freefall Monitor shutdown complete");
    Ok(())
}

async fn run_source<S: SampleSource>(
    handle: &ControllerHandle,
    cancel_token: CancellationToken,
    rate_hz: f32,
    mut source: S,
) -> Result<()> {
    ProcessingLoop::new(handle.clone(), cancel_token, rate_hz)
        .run(&mut source)
        .await?;
    Ok(())
}

/// Pull the log off the store and replay it through the label handlers.
async fn download_log(handle: &ControllerHandle, registry: &SubscriberRegistry, since: Timestamp) -> Result<()> {
    let download = handle
        .download(since, Box::new(TracingObserver::default()), CancellationToken::new())
        .await
        .context("Failed to start log download")?;
    info!(entries = download.total(), since, "Downloading event log");

    let registry = registry.clone();
    let summary = tokio::task::spawn_blocking(move || download.drain_into(&registry))
        .await
        .context("Download task failed")?
        .context("Log download failed")?;

    info!(
        delivered = summary.delivered,
        total = summary.total,
        completed = summary.completed,
        "Event log downloaded"
    );
    Ok(())
}
