//! Configuration for the group admin coordinator

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix (`RSGROUP_OPERATION_TIMEOUT_MS`, ...)
const ENV_PREFIX: &str = "RSGROUP";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upper bound for a `move_servers` convergence wait
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,

    /// Sleep between two convergence checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Append membership audit entries to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_operation_timeout() -> u64 {
    30_000
}
fn default_poll_interval() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operation_timeout_ms: default_operation_timeout(),
            poll_interval_ms: default_poll_interval(),
            audit_log: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then `RSGROUP_*`
    /// environment variables (environment wins).
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the poll loop cannot honor
    pub fn validate(&self) -> crate::Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.poll_interval_ms >= self.operation_timeout_ms {
            return Err(crate::Error::InvalidConfig(format!(
                "poll_interval_ms ({}) must be smaller than operation_timeout_ms ({})",
                self.poll_interval_ms, self.operation_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
