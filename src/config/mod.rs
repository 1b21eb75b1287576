//! Typed configuration from a TOML file and environment variables.
//!
//! Loads once at startup and fails fast on invalid values. Environment
//! variables override file values; anything unset keeps its default.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::PoolConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum number of buffered events.
    pub queue_capacity: usize,
    /// Maximum number of events processed at once.
    pub max_workers: usize,
    /// Where processed-event records are appended.
    pub processed_events_file: PathBuf,
    /// How long shutdown waits for in-flight events.
    pub shutdown_timeout_secs: u64,
    /// Wait between a failed attempt and its retry.
    pub retry_backoff_ms: u64,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            max_workers: 5,
            processed_events_file: PathBuf::from("/tmp/events.json"),
            shutdown_timeout_secs: 20,
            retry_backoff_ms: 2000,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables over the defaults.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read config file {}: {e}", path.display()))
                })?;
                toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("bad config file {}: {e}", path.display()))
                })?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = parsed_var("EVENTQ_QUEUE_CAPACITY")? {
            self.queue_capacity = v;
        }
        if let Some(v) = parsed_var("EVENTQ_MAX_WORKERS")? {
            self.max_workers = v;
        }
        if let Ok(v) = std::env::var("EVENTQ_PROCESSED_EVENTS_FILE") {
            self.processed_events_file = PathBuf::from(v);
        }
        if let Some(v) = parsed_var("EVENTQ_SHUTDOWN_TIMEOUT_SECS")? {
            self.shutdown_timeout_secs = v;
        }
        if let Some(v) = parsed_var("EVENTQ_RETRY_BACKOFF_MS")? {
            self.retry_backoff_ms = v;
        }
        if let Ok(v) = std::env::var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }

    /// Check every value the core depends on.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be a positive integer".to_string()));
        }
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be a positive integer".to_string()));
        }
        if self.processed_events_file.as_os_str().is_empty() {
            return Err(Error::Config("processed_events_file must not be empty".to_string()));
        }
        if self.shutdown_timeout_secs == 0 {
            return Err(Error::Config(
                "shutdown_timeout_secs must be a positive integer".to_string(),
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(Error::Config("log_level must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            concurrency_limit: self.max_workers,
            retry_backoff: self.retry_backoff(),
        }
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
