//! Poll loop tuning

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Tuning knobs for the poll loop
///
/// All fields have defaults, so a YAML document only needs the keys it
/// changes:
///
/// ```yaml
/// readiness_timeout_ms: 250
/// chunk_size: 4096
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// Upper bound on how long a drain waits for a pipe to become readable
    pub readiness_timeout_ms: u64,
    /// Size of each read from a pipe, in bytes
    pub chunk_size: usize,
    /// Pause between ticks when no pipe is left to wait on
    pub idle_interval_ms: u64,
    /// Kill the child when the loop is cancelled
    pub kill_on_cancel: bool,
    /// Kill the child when its handle is dropped while it is still running
    pub kill_on_drop: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            readiness_timeout_ms: 1000,
            chunk_size: 1024,
            idle_interval_ms: 50,
            kill_on_cancel: true,
            kill_on_drop: true,
        }
    }
}

impl PollConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: PollConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Reject values the poll loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if self.readiness_timeout_ms == 0 {
            return Err(Error::Config(
                "readiness_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Readiness wait as a `Duration`
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    /// Idle pause as a `Duration`
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}
