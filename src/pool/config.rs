//! Pool Configuration
//!
//! The pool reads its settings once, at startup, from a JSON file:
//!
//! ```text
//! {
//!     "ip": "127.0.0.1",
//!     "user": "root",
//!     "password": "",
//!     "database": "test",
//!     "port": 3306,
//!     "minSize": 4,
//!     "maxSize": 10,
//!     "acquireTimeoutMillis": 1000,
//!     "maxIdleTimeSeconds": 60
//! }
//! ```
//!
//! A missing or malformed file is not fatal: [`PoolConfig::load_or_default`]
//! logs the problem and keeps the built-in defaults.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur while loading the pool configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for a [`ResourcePool`](crate::pool::ResourcePool).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Address of the backing store
    pub ip: String,

    #[serde(alias = "userName")]
    pub user: String,

    pub password: String,

    #[serde(alias = "dbName")]
    pub database: String,

    pub port: u16,

    /// Connections created at startup and never reclaimed
    pub min_size: usize,

    /// Hard cap on connections, idle and lent out
    pub max_size: usize,

    /// How long `acquire` waits for a free connection
    #[serde(alias = "timeout")]
    pub acquire_timeout_millis: u64,

    /// Idle time after which a surplus connection is destroyed
    #[serde(alias = "maxIdleTime")]
    pub max_idle_time_seconds: u64,

    /// Period of the reclamation task
    pub reap_interval_millis: u64,

    /// Pause before the growth task retries a failed creation
    pub create_retry_millis: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            user: "root".to_string(),
            password: String::new(),
            database: "test".to_string(),
            port: 3306,
            min_size: 4,
            max_size: 10,
            acquire_timeout_millis: 1000,
            max_idle_time_seconds: 60,
            reap_interval_millis: 500,
            create_retry_millis: 100,
        }
    }
}

impl PoolConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PoolConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration, falling back to defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!(path = %path.display(), "Pool configuration loaded");
                config
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load pool configuration, using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::Invalid("maxSize must be positive".to_string()));
        }
        if self.min_size > self.max_size {
            return Err(ConfigError::Invalid(format!(
                "minSize ({}) exceeds maxSize ({})",
                self.min_size, self.max_size
            )));
        }
        if self.reap_interval_millis == 0 {
            return Err(ConfigError::Invalid(
                "reapIntervalMillis must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `ip:port` of the backing store.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_millis)
    }

    pub fn max_idle_time(&self) -> Duration {
        Duration::from_secs(self.max_idle_time_seconds)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_millis)
    }

    pub fn create_retry_interval(&self) -> Duration {
        Duration::from_millis(self.create_retry_millis)
    }
}
