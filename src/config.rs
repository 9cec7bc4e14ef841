//! Runtime configuration
//!
//! Every field has a default, so an empty JSON object (`{}`) is a valid
//! configuration file.
//!
//! ```json
//! {
//!     "manager": { "max_cores": 64, "cycles_per_dispatch": 256 },
//!     "bridge":  { "console_history": 512,
//!                  "retry": { "max_attempts": 5, "initial_backoff_ms": 10 } },
//!     "data_dir": "data/glyphs"
//! }
//! ```

use crate::error::{GlyphError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of execution cores
pub const DEFAULT_MAX_CORES: usize = 64;

/// Upper bound on `max_cores`; keeps the register bank buffer small
pub const MAX_CORES_LIMIT: usize = 256;

/// Default instruction budget per core per dispatch
pub const DEFAULT_CYCLES_PER_DISPATCH: u32 = 256;

/// Execution Manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Size of the core slot free-list
    pub max_cores: usize,
    /// Instructions each running core may retire per dispatch
    pub cycles_per_dispatch: u32,
    /// Retry policy for register bank and program transfers
    pub transfer_retry: RetryPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_cores: DEFAULT_MAX_CORES,
            cycles_per_dispatch: DEFAULT_CYCLES_PER_DISPATCH,
            transfer_retry: RetryPolicy::default(),
        }
    }
}

impl ManagerConfig {
    /// Config with a specific core count and defaults elsewhere
    pub fn with_max_cores(max_cores: usize) -> Self {
        Self {
            max_cores,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_cores == 0 {
            return Err(GlyphError::Config("max_cores must be at least 1".into()));
        }
        if self.max_cores > MAX_CORES_LIMIT {
            return Err(GlyphError::Config(format!(
                "max_cores {} exceeds limit {}",
                self.max_cores, MAX_CORES_LIMIT
            )));
        }
        if self.cycles_per_dispatch == 0 {
            return Err(GlyphError::Config(
                "cycles_per_dispatch must be at least 1".into(),
            ));
        }
        self.transfer_retry.validate()
    }
}

/// Supervisor Call Bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bounds consecutive mailbox transfer failures
    pub retry: RetryPolicy,
    /// Flushed console lines kept for the host
    pub console_history: usize,
    /// Calls serviced per supervisor tick
    pub max_calls_per_tick: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            console_history: 256,
            max_calls_per_tick: 16,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_calls_per_tick == 0 {
            return Err(GlyphError::Config(
                "max_calls_per_tick must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub manager: ManagerConfig,
    pub bridge: BridgeConfig,
    /// Directory used by `loader::load_path`
    pub data_dir: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Parse a JSON configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| GlyphError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.manager.validate()?;
        self.bridge.validate()
    }
}
