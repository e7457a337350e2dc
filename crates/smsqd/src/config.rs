//! Daemon configuration.
//!
//! Loaded from an optional TOML file. Every field has a default, so an
//! empty file (or no file at all) yields a working configuration:
//!
//! ```toml
//! queue_capacity = 100
//! worker_count = 3
//! discovery_interval_secs = 15
//! produce_interval_secs = 3
//! empty_registry_backoff_secs = 3
//! backpressure_delay_ms = 1000
//! startup_delay_secs = 10
//! mmcli_path = "mmcli"
//! post_send_delay_secs = 10
//!
//! [source]
//! destination = "+99361041499"
//! body = "Hello, world!"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use smsq_core::{DomainError, OutboundSms};
use thiserror::Error;

use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The configured source message is not a valid SMS
    #[error("invalid source message: {0}")]
    Message(#[from] DomainError),
}

/// The message returned by the static message source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub destination: String,
    pub body: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            destination: "+99361041499".to_string(),
            body: "Hello, world!".to_string(),
        }
    }
}

/// Runtime configuration of the dispatch pipeline and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Capacity of the dispatch queue.
    pub queue_capacity: usize,
    /// Number of concurrent send workers.
    pub worker_count: usize,
    /// Pause between discovery/enable passes.
    pub discovery_interval_secs: u64,
    /// Pause between production cycles.
    pub produce_interval_secs: u64,
    /// Retry delay while no modem is known.
    pub empty_registry_backoff_secs: u64,
    /// Delay applied when an enqueue hits a full queue.
    pub backpressure_delay_ms: u64,
    /// Head start given to discovery before workers and producer start.
    pub startup_delay_secs: u64,
    /// Path or name of the mmcli binary.
    pub mmcli_path: String,
    /// Pause after every successful send.
    pub post_send_delay_secs: u64,
    pub source: SourceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: 3,
            discovery_interval_secs: 15,
            produce_interval_secs: 3,
            empty_registry_backoff_secs: 3,
            backpressure_delay_ms: 1000,
            startup_delay_secs: 10,
            mmcli_path: smsq_mmcli::DEFAULT_MMCLI_PATH.to_string(),
            post_send_delay_secs: smsq_mmcli::DEFAULT_POST_SEND_DELAY.as_secs(),
            source: SourceConfig::default(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid {
                field: "worker_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.mmcli_path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "mmcli_path",
                reason: "must not be empty".to_string(),
            });
        }
        self.source_message()?;
        Ok(())
    }

    /// The message served by the static source.
    pub fn source_message(&self) -> Result<OutboundSms, ConfigError> {
        Ok(OutboundSms::new(
            self.source.destination.clone(),
            self.source.body.clone(),
        )?)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn produce_interval(&self) -> Duration {
        Duration::from_secs(self.produce_interval_secs)
    }

    pub fn empty_registry_backoff(&self) -> Duration {
        Duration::from_secs(self.empty_registry_backoff_secs)
    }

    pub fn backpressure_delay(&self) -> Duration {
        Duration::from_millis(self.backpressure_delay_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn post_send_delay(&self) -> Duration {
        Duration::from_secs(self.post_send_delay_secs)
    }
}
