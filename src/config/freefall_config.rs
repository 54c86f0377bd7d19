//! Free-fall pipeline configuration as operator-tunable TOML values
//!
//! Each section implements `Default` with the values the detector ships
//! with, so a missing file or a partial file behaves like the stock setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::processing::{Boundary, ThresholdOutputMode};
use crate::types::SessionMode;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "FREEFALL_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "freefall.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a detector deployment.
///
/// Load with `FreefallConfig::load()` which searches:
/// 1. `$FREEFALL_CONFIG`
/// 2. `./freefall.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FreefallConfig {
    /// Accelerometer settings
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Operator chain and classifier settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Event log storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Link endpoint
    #[serde(default)]
    pub link: LinkConfig,
}

impl FreefallConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), mode = %config.pipeline.mode, "Loaded config from FREEFALL_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FREEFALL_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FREEFALL_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./freefall.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(mode = %config.pipeline.mode, "Loaded config from ./freefall.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./freefall.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No freefall.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys only produce warnings; everything else must validate.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Validate all values for internal consistency.
    ///
    /// Every problem is collected so one run reports them all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = super::validation::validate_ranges(self);

        if self.pipeline.window_size == 0 {
            errors.push("pipeline.window_size must be > 0".to_string());
        }
        if self.storage.capacity_entries == 0 {
            errors.push("storage.capacity_entries must be > 0".to_string());
        }
        if self.storage.backend == StorageBackend::Sled && self.storage.path.as_os_str().is_empty() {
            errors.push("storage.path must be set for the sled backend".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sensor
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Output data rate requested from the sample source (Hz)
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: f32,

    /// Full-scale range (g); larger magnitudes are rejected
    #[serde(default = "default_max_abs_g")]
    pub max_abs_g: f32,
}

fn default_sample_rate_hz() -> f32 {
    defaults::SAMPLE_RATE_HZ
}

fn default_max_abs_g() -> f32 {
    defaults::MAX_ABS_G
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_sample_rate_hz(),
            max_abs_g: default_max_abs_g(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Moving-average window (samples)
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Free-fall threshold on the averaged magnitude (g)
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Whether a value exactly at the threshold counts as above it
    #[serde(default)]
    pub boundary: Boundary,

    /// Threshold output: `binary` (+1 / -1) or `absolute` (pass-through)
    #[serde(default)]
    pub output_mode: ThresholdOutputMode,

    /// Delivery model for sessions started on link-up
    #[serde(default)]
    pub mode: SessionMode,
}

fn default_window_size() -> usize {
    defaults::WINDOW_SIZE
}

fn default_threshold() -> f32 {
    defaults::FREE_FALL_THRESHOLD_G
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            threshold: default_threshold(),
            boundary: Boundary::default(),
            output_mode: ThresholdOutputMode::default(),
            mode: SessionMode::default(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Where log entries are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// sled database on disk
    #[default]
    Sled,
    /// Bounded in-memory log (tests, dry runs)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database path for the sled backend
    #[serde(default = "default_log_path")]
    pub path: PathBuf,

    /// Entries the log holds before appends fail with StorageFull
    #[serde(default = "default_capacity_entries")]
    pub capacity_entries: usize,
}

fn default_log_path() -> PathBuf {
    PathBuf::from(defaults::LOG_DB_PATH)
}

fn default_capacity_entries() -> usize {
    defaults::LOG_CAPACITY_ENTRIES
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_log_path(),
            capacity_entries: default_capacity_entries(),
        }
    }
}

// ============================================================================
// Link
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// MAC address of the sensor board
    #[serde(default = "default_device_address")]
    pub device_address: String,
}

fn default_device_address() -> String {
    defaults::DEVICE_ADDRESS.to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_address: default_device_address(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = FreefallConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.window_size, 4);
        assert_eq!(config.pipeline.threshold, 0.5);
        assert_eq!(config.sensor.sample_rate_hz, 50.0);
        assert_eq!(config.pipeline.mode, SessionMode::Log);
        assert_eq!(config.pipeline.boundary, Boundary::Inclusive);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = FreefallConfig::from_toml_str(
            r#"
[pipeline]
mode = "stream"
boundary = "exclusive"
"#,
        )
        .expect("partial config parses");
        assert_eq!(config.pipeline.mode, SessionMode::Stream);
        assert_eq!(config.pipeline.boundary, Boundary::Exclusive);
        assert_eq!(config.pipeline.window_size, 4);
        assert_eq!(config.storage.backend, StorageBackend::Sled);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = FreefallConfig::default();
        config.pipeline.window_size = 0;
        config.storage.capacity_entries = 0;
        config.sensor.sample_rate_hz = -1.0;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 3, "got: {errors:?}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_toml_roundtrip_preserves_mode() {
        let mut config = FreefallConfig::default();
        config.pipeline.mode = SessionMode::Stream;
        let text = config.to_toml().expect("serialize");
        let back = FreefallConfig::from_toml_str(&text).expect("parse back");
        assert_eq!(back.pipeline.mode, SessionMode::Stream);
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let err = FreefallConfig::load_from_file(Path::new("/nonexistent/freefall.toml"))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
