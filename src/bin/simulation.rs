//! Accelerometer Drop Simulation
//!
//! Generates a 3-axis accelerometer trace for a board that rests, falls,
//! hits the ground and settles, with Gaussian noise on every axis.
//!
//! # Usage
//! ```bash
//! ./simulation --drops 3 --speed 1 | ./freefall-monitor --stdin
//! ```

use clap::Parser;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use freefall_monitor::config::defaults::SAMPLE_RATE_HZ;
use freefall_monitor::pipeline::scenario::{DropPhase, DropScenario};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "freefall-simulation")]
#[command(about = "Synthetic accelerometer drop traces for freefall-monitor testing")]
#[command(version = "1.0")]
struct Args {
    /// Number of consecutive drops
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..=100))]
    drops: u32,

    /// Output data rate in Hz
    #[arg(long, default_value_t = SAMPLE_RATE_HZ)]
    rate: f32,

    /// Time compression factor (1 = real-time, 0 = as fast as possible)
    #[arg(short, long, default_value = "0")]
    speed: f32,

    /// Rest before each drop (ms)
    #[arg(long, default_value = "1000")]
    rest_ms: u64,

    /// Free-fall duration (ms)
    #[arg(long, default_value = "400")]
    fall_ms: u64,

    /// Per-axis noise standard deviation (g)
    #[arg(long, default_value = "0.02")]
    noise: f32,

    /// Output format: json or csv
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Suppress phase log (only output samples)
    #[arg(short, long)]
    quiet: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

fn log_phase(time_ms: u64, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[{:>8.3}s] {}", time_ms as f64 / 1000.0, message);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let interval = if args.speed > 0.0 && args.rate > 0.0 {
        Duration::from_secs_f64(1.0 / (f64::from(args.rate) * f64::from(args.speed)))
    } else {
        Duration::ZERO
    };

    log_phase(0, &"=".repeat(60), args.quiet);
    log_phase(0, "ACCELEROMETER DROP SIMULATION", args.quiet);
    log_phase(0, &format!("  Drops: {} | Rate: {} Hz | Noise: {} g", args.drops, args.rate, args.noise), args.quiet);
    if let Some(seed) = args.seed {
        log_phase(0, &format!("  Random seed: {}", seed), args.quiet);
    }
    log_phase(0, &"=".repeat(60), args.quiet);

    if args.format == "csv" {
        println!("timestamp,x,y,z,magnitude");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut offset_ms = 0u64;

    for drop_index in 0..args.drops {
        let scenario = DropScenario {
            rate_hz: args.rate,
            rest_ms: args.rest_ms,
            fall_ms: args.fall_ms,
            noise_g: args.noise,
            // Each drop gets its own stream so drops differ but stay reproducible
            seed: args.seed.map(|s| s.wrapping_add(u64::from(drop_index))),
            ..DropScenario::default()
        };

        let mut phase = None;
        for mut sample in scenario.samples() {
            let loop_start = Instant::now();

            let current = scenario.phase_at(sample.timestamp);
            if phase != Some(current) {
                let label = match current {
                    DropPhase::Rest => "Resting (1 g on z)",
                    DropPhase::FreeFall => "FREE FALL (expected: free fall events)",
                    DropPhase::Impact => "Impact",
                    DropPhase::Settled => "Settled",
                };
                log_phase(offset_ms + sample.timestamp, &format!("Drop {}: {}", drop_index + 1, label), args.quiet);
                phase = Some(current);
            }

            sample.timestamp += offset_ms;
            match args.format.as_str() {
                "csv" => writeln!(
                    out,
                    "{},{:.4},{:.4},{:.4},{:.4}",
                    sample.timestamp,
                    sample.x,
                    sample.y,
                    sample.z,
                    sample.magnitude()
                )?,
                _ => writeln!(out, "{}", serde_json::to_string(&sample)?)?,
            }

            if !interval.is_zero() {
                out.flush()?;
                if let Some(remaining) = interval.checked_sub(loop_start.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
        }
        offset_ms += scenario.duration_ms();
    }

    out.flush()?;
    log_phase(offset_ms, "SIMULATION COMPLETE", args.quiet);
    Ok(())
}
