//! System-wide default constants.
//!
//! Centralises the numbers the pipeline ships with. Grouped by subsystem
//! for easy discovery.

// ============================================================================
// Sensor
// ============================================================================

/// Accelerometer output data rate (Hz).
pub const SAMPLE_RATE_HZ: f32 = 50.0;

/// Accelerometer full-scale range (g). Readings with a larger magnitude
/// cannot come from the sensor and are rejected at ingestion.
pub const MAX_ABS_G: f32 = 16.0;

// ============================================================================
// Pipeline
// ============================================================================

/// Moving-average window (samples).
///
/// 4 samples at 50 Hz = 80 ms of smoothing.
pub const WINDOW_SIZE: usize = 4;

/// Averaged magnitude (g) below which the board is considered in free fall.
pub const FREE_FALL_THRESHOLD_G: f32 = 0.5;

/// Capacity of the controller actor's command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Storage
// ============================================================================

/// Default on-disk location of the event log.
pub const LOG_DB_PATH: &str = "./data/freefall_log.db";

/// Maximum number of entries the event log holds before appends fail.
pub const LOG_CAPACITY_ENTRIES: usize = 65_536;

/// Name of the sled tree holding log entries.
pub const LOG_TREE_NAME: &str = "event_log";

// ============================================================================
// Link
// ============================================================================

/// MAC address of the sensor board.
pub const DEVICE_ADDRESS: &str = "F0:62:91:C0:19:2F";
