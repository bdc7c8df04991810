//! VM configuration
//!
//! Every field has a default, so a JSON config only needs the keys it
//! overrides.

use crate::heap::{DEFAULT_GC_GROWTH, DEFAULT_GC_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Call frames per fiber
pub const DEFAULT_MAX_FRAMES: usize = 64;

/// Operand slots budgeted per frame
pub const DEFAULT_SLOTS_PER_FRAME: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub max_frames: usize,
    pub slots_per_frame: usize,
    pub gc_initial_threshold: usize,
    pub gc_growth_factor: usize,
    /// Collect at every safe point
    pub gc_stress: bool,
    /// Appended to a user module name to form its file path
    pub module_extension: String,
    /// Log every executed instruction at trace level
    pub trace_execution: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            slots_per_frame: DEFAULT_SLOTS_PER_FRAME,
            gc_initial_threshold: DEFAULT_GC_THRESHOLD,
            gc_growth_factor: DEFAULT_GC_GROWTH,
            gc_stress: false,
            module_extension: ".ember".to_string(),
            trace_execution: false,
        }
    }
}

impl VmConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: VmConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frames == 0 {
            return Err(ConfigError::Invalid("max_frames must be at least 1".into()));
        }
        if self.slots_per_frame == 0 {
            return Err(ConfigError::Invalid(
                "slots_per_frame must be at least 1".into(),
            ));
        }
        if self.gc_growth_factor < 1 {
            return Err(ConfigError::Invalid(
                "gc_growth_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Operand stack capacity of one fiber
    pub fn stack_slots(&self) -> usize {
        self.max_frames.saturating_mul(self.slots_per_frame)
    }
}
