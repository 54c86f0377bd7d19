//! End-to-End Pipeline Tests
//!
//! Drives the full controller → coordinator → sink path with a 40-sample
//! sequence: averages below the threshold through index 19, above it from
//! index 20. Window 4, threshold 0.5, samples 20 ms apart. Indices 0-3 only
//! fill the window, so events cover 4..=39.

use std::sync::{Arc, Mutex};

use freefall_monitor::config::FreefallConfig;
use freefall_monitor::controller::{ConnectionController, SimulatedLink};
use freefall_monitor::download::NoopObserver;
use freefall_monitor::processing::{Boundary, ThresholdOutputMode};
use freefall_monitor::storage::InMemoryLogStore;
use freefall_monitor::{Label, Sample, SampleOutcome, SessionMode, SubscriberRegistry, Timestamp};
use tokio_util::sync::CancellationToken;

const PERIOD_MS: u64 = 20;

/// Magnitude 0.1 g for indices 0..=19, a 2 g jolt at 20, then 1 g.
///
/// The jolt pulls the window ending at 20 (indices 17..=20) above 0.5 g:
/// (3 × 0.1 + 2.0) / 4 = 0.575.
fn crossing_sequence() -> Vec<Sample> {
    (0..40u64)
        .map(|i| {
            let z = match i {
                0..=19 => 0.1,
                20 => 2.0,
                _ => 1.0,
            };
            Sample::new(i * PERIOD_MS, 0.0, 0.0, z)
        })
        .collect()
}

fn index_of(ts: Timestamp) -> u64 {
    ts / PERIOD_MS
}

fn config(boundary: Boundary, output_mode: ThresholdOutputMode) -> FreefallConfig {
    let mut config = FreefallConfig::default();
    config.pipeline.window_size = 4;
    config.pipeline.threshold = 0.5;
    config.pipeline.boundary = boundary;
    config.pipeline.output_mode = output_mode;
    config
}

fn recording_registry() -> (SubscriberRegistry, Arc<Mutex<Vec<(Label, u64)>>>) {
    let registry = SubscriberRegistry::new();
    let seen: Arc<Mutex<Vec<(Label, u64)>>> = Arc::default();
    for label in Label::ALL {
        let s = Arc::clone(&seen);
        registry.subscribe(label, move |label: Label, ts: Timestamp| {
            s.lock().expect("lock").push((label, index_of(ts)));
        });
    }
    (registry, seen)
}

fn expected_labels() -> Vec<(Label, u64)> {
    (4..40u64)
        .map(|i| {
            let label = if i < 20 { Label::FreeFall } else { Label::NoFreeFall };
            (label, i)
        })
        .collect()
}

fn run_stream(config: FreefallConfig) -> Vec<(Label, u64)> {
    let (registry, seen) = recording_registry();
    let mut controller = ConnectionController::new(
        config,
        Box::new(SimulatedLink::full("e2e")),
        Arc::new(InMemoryLogStore::new(128)),
        registry,
    );
    controller.start_session(SessionMode::Stream).expect("start");
    controller.link_established().expect("wire");

    for (i, sample) in crossing_sequence().iter().enumerate() {
        let outcome = controller.ingest(sample).expect("stream ingest");
        if i < 4 {
            assert_eq!(outcome, SampleOutcome::WarmingUp, "no output before the window fills");
        }
    }
    controller.stop_session().expect("stop");

    let seen = seen.lock().expect("lock").clone();
    seen
}

#[test]
fn stream_mode_labels_follow_the_average() {
    let events = run_stream(config(Boundary::Inclusive, ThresholdOutputMode::Binary));
    assert_eq!(events, expected_labels());
}

#[test]
fn first_event_comes_at_index_window_size() {
    let events = run_stream(config(Boundary::Inclusive, ThresholdOutputMode::Binary));
    assert_eq!(events.len(), 36);
    assert_eq!(events.first(), Some(&(Label::FreeFall, 4)));
    assert!(events.iter().all(|(_, i)| *i >= 4), "events while the window filled");
}

#[test]
fn absolute_output_mode_gives_the_same_labels() {
    let events = run_stream(config(Boundary::Inclusive, ThresholdOutputMode::Absolute));
    assert_eq!(events, expected_labels());
}

#[test]
fn log_mode_download_replays_the_same_labels() {
    let store = Arc::new(InMemoryLogStore::new(128));
    let mut controller = ConnectionController::new(
        config(Boundary::Inclusive, ThresholdOutputMode::Binary),
        Box::new(SimulatedLink::full("e2e-log")),
        store.clone(),
        SubscriberRegistry::new(),
    );
    controller.start_session(SessionMode::Log).expect("start");
    controller.link_established().expect("wire");
    for sample in crossing_sequence() {
        controller.ingest(&sample).expect("log ingest");
    }
    controller.stop_session().expect("stop");

    let events: Vec<(Label, u64)> = controller
        .download(0, Box::new(NoopObserver), CancellationToken::new())
        .expect("download")
        .map(|item| {
            let item = item.expect("entry");
            (item.event.label, index_of(item.event.timestamp))
        })
        .collect();
    assert_eq!(events, expected_labels());
}

#[test]
fn boundary_choice_decides_values_at_the_threshold() {
    // Every window averages exactly 0.5 g
    let flat: Vec<Sample> = (0..6u64).map(|i| Sample::new(i * PERIOD_MS, 0.0, 0.0, 0.5)).collect();

    for (boundary, expected) in [
        (Boundary::Inclusive, Label::NoFreeFall),
        (Boundary::Exclusive, Label::FreeFall),
    ] {
        for output_mode in [ThresholdOutputMode::Binary, ThresholdOutputMode::Absolute] {
            let (registry, seen) = recording_registry();
            let mut controller = ConnectionController::new(
                config(boundary, output_mode),
                Box::new(SimulatedLink::full("boundary")),
                Arc::new(InMemoryLogStore::new(8)),
                registry,
            );
            controller.start_session(SessionMode::Stream).expect("start");
            controller.link_established().expect("wire");
            for sample in &flat {
                controller.ingest(sample).expect("ingest");
            }

            let labels: Vec<Label> = seen.lock().expect("lock").iter().map(|(l, _)| *l).collect();
            assert_eq!(labels, vec![expected; 2], "{boundary:?} / {output_mode:?}");
        }
    }
}

#[test]
fn invalid_samples_are_dropped_without_breaking_the_window() {
    let (registry, seen) = recording_registry();
    let mut controller = ConnectionController::new(
        config(Boundary::Inclusive, ThresholdOutputMode::Binary),
        Box::new(SimulatedLink::full("invalid")),
        Arc::new(InMemoryLogStore::new(8)),
        registry,
    );
    controller.start_session(SessionMode::Stream).expect("start");
    controller.link_established().expect("wire");

    let samples = [
        Sample::new(0, 0.0, 0.0, 1.0),
        Sample::new(20, f32::NAN, 0.0, 1.0),
        Sample::new(40, 0.0, 0.0, 1.0),
        Sample::new(60, 0.0, 0.0, 40.0),
        Sample::new(30, 0.0, 0.0, 1.0),
        Sample::new(80, 0.0, 0.0, 1.0),
        Sample::new(100, 0.0, 0.0, 1.0),
        Sample::new(120, 0.0, 0.0, 1.0),
    ];
    let rejected = samples
        .iter()
        .map(|s| controller.ingest(s).expect("ingest"))
        .filter(|o| matches!(o, SampleOutcome::Rejected(_)))
        .count();

    assert_eq!(rejected, 3);
    assert_eq!(*seen.lock().expect("lock"), vec![(Label::NoFreeFall, 6)]);
    let stats = controller.stats().session.expect("session stats");
    assert_eq!(stats.samples_rejected, 3);
    assert_eq!(stats.no_free_fall_events, 1);
}
