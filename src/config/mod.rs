//! Pipeline Configuration Module
//!
//! Provides the free-fall pipeline configuration loaded from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `FREEFALL_CONFIG` environment variable (path to TOML file)
//! 2. `freefall.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Binaries call `config::init()` once at startup, then `config::get()`
//! anywhere. Library components take the relevant section by value so they
//! stay testable without global state.
//!
//! ```ignore
//! config::init(FreefallConfig::load());
//! let window = config::get().pipeline.window_size;
//! ```

mod freefall_config;
pub mod defaults;
pub mod validation;

pub use freefall_config::*;

use std::sync::OnceLock;

/// Global configuration, initialized once at startup.
static FREEFALL_CONFIG: OnceLock<FreefallConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// A second call is ignored with a warning.
pub fn init(config: FreefallConfig) {
    if FREEFALL_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Falls back to built-in defaults if `init()` was never called.
pub fn get() -> &'static FreefallConfig {
    FREEFALL_CONFIG.get_or_init(|| {
        tracing::warn!("config::get() called before config::init(), using defaults");
        FreefallConfig::default()
    })
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    FREEFALL_CONFIG.get().is_some()
}
