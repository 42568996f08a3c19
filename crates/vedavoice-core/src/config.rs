//! Configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! ```toml
//! storage_key = "vv_api_retry_queue"
//! default_max_retries = 3
//! backoff_base_ms = 1000
//! backoff_multiplier = 2.0
//! max_age_hours = 24
//! online_settle_ms = 1000
//!
//! [probe]
//! url = "https://vedavoice.org/health"
//! interval_secs = 15
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::queue::RetryPolicy;

pub const DEFAULT_STORAGE_KEY: &str = "vv_api_retry_queue";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Key the whole queue is stored under.
    pub storage_key: String,
    pub default_max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_multiplier: f64,
    /// Persisted requests older than this are dropped on load.
    pub max_age_hours: u64,
    /// Wait after reconnecting before the first drain attempt.
    pub online_settle_ms: u64,
    /// Optional reachability probe for hosts without OS network events.
    pub probe: Option<ProbeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub url: String,
    #[serde(default = "default_probe_interval_secs")]
    pub interval_secs: u64,
}

fn default_probe_interval_secs() -> u64 {
    15
}

impl Default for QueueConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_max_retries: policy.default_max_retries,
            backoff_base_ms: policy.base_delay.as_millis() as u64,
            backoff_multiplier: policy.multiplier,
            max_age_hours: policy.max_age.as_secs() / 3600,
            online_settle_ms: policy.online_settle_delay.as_millis() as u64,
            probe: None,
        }
    }
}

impl QueueConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// `from_file` when a path is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.backoff_base_ms),
            multiplier: self.backoff_multiplier,
            default_max_retries: self.default_max_retries,
            max_age: Duration::from_secs(self.max_age_hours.saturating_mul(3600)),
            online_settle_delay: Duration::from_millis(self.online_settle_ms),
        }
    }

    pub fn probe_interval(&self) -> Option<Duration> {
        self.probe
            .as_ref()
            .map(|probe| Duration::from_secs(probe.interval_secs.max(1)))
    }
}
