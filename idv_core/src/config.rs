//! YAML poller configuration.
//!
//! Every field is optional; missing fields fall back to the standard
//! schedule. Example:
//!
//! ```yaml
//! initial_delay_ms: 5000
//! second_delay_ms: 3000
//! steady_delay_ms: 2000
//! max_attempts: 15
//! check_timeout_ms: 10000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{IdvError, Result};
use crate::schedule::{
    PollSchedule, INITIAL_DELAY, MAX_ATTEMPTS, MAX_ATTEMPTS_LIMIT, SECOND_DELAY, STEADY_DELAY,
};

/// Poller configuration as read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollerConfig {
    /// Delay before the first check, in milliseconds
    pub initial_delay_ms: u64,
    /// Delay before the second check, in milliseconds
    pub second_delay_ms: u64,
    /// Delay before every later check, in milliseconds
    pub steady_delay_ms: u64,
    /// Attempt budget per session
    pub max_attempts: u32,
    /// Optional deadline for a single check, in milliseconds
    pub check_timeout_ms: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: INITIAL_DELAY.as_millis() as u64,
            second_delay_ms: SECOND_DELAY.as_millis() as u64,
            steady_delay_ms: STEADY_DELAY.as_millis() as u64,
            max_attempts: MAX_ATTEMPTS,
            check_timeout_ms: None,
        }
    }
}

impl PollerConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&yaml)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded poller configuration");
        Ok(config)
    }

    /// Rejects values that would make a session unbounded or degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(IdvError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(IdvError::Config(format!(
                "max_attempts must be at most {}, got {}",
                MAX_ATTEMPTS_LIMIT, self.max_attempts
            )));
        }
        for (name, value) in [
            ("initial_delay_ms", self.initial_delay_ms),
            ("second_delay_ms", self.second_delay_ms),
            ("steady_delay_ms", self.steady_delay_ms),
        ] {
            if value == 0 {
                return Err(IdvError::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.check_timeout_ms == Some(0) {
            return Err(IdvError::Config(
                "check_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts the configuration into a runtime schedule.
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            second_delay: Duration::from_millis(self.second_delay_ms),
            steady_delay: Duration::from_millis(self.steady_delay_ms),
            max_attempts: self.max_attempts,
            check_timeout: self.check_timeout_ms.map(Duration::from_millis),
        }
    }
}

impl From<&PollerConfig> for PollSchedule {
    fn from(config: &PollerConfig) -> Self {
        config.schedule()
    }
}
