//! Link to the sensor board
//!
//! The controller only needs to know which modules the board exposes and
//! how to reset it. Discovery and transport live outside this crate.

use std::collections::HashSet;
use tracing::info;

use crate::error::PipelineError;
use crate::types::Capability;

pub trait Link: Send {
    /// Board address, for logging.
    fn address(&self) -> &str;

    fn supports(&self, capability: Capability) -> bool;

    /// Reset the board. Only called when `supports(Capability::Reset)`.
    fn reset(&mut self) -> Result<(), PipelineError>;
}

/// In-process stand-in for a board, with a fixed capability set.
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    address: String,
    capabilities: HashSet<Capability>,
    resets: u32,
}

impl SimulatedLink {
    pub fn new(address: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            address: address.into(),
            capabilities: capabilities.into_iter().collect(),
            resets: 0,
        }
    }

    /// A board exposing every module.
    pub fn full(address: impl Into<String>) -> Self {
        Self::new(
            address,
            [
                Capability::Accelerometer,
                Capability::Streaming,
                Capability::Logging,
                Capability::Reset,
            ],
        )
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }
}

impl Link for SimulatedLink {
    fn address(&self) -> &str {
        &self.address
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn reset(&mut self) -> Result<(), PipelineError> {
        self.resets += 1;
        info!(address = %self.address, resets = self.resets, "Board reset");
        Ok(())
    }
}
