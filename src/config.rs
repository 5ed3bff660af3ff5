//! Server configuration, loaded from TOML.
//!
//! ```toml
//! addr = "0.0.0.0:3000"
//! request_timeout_ms = 30000
//! max_body_bytes = 1048576
//! log_filter = "info,stacks=debug"
//! ```
//!
//! Every key is optional; missing ones take the [`Default`] values.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::middleware::DEFAULT_BODY_LIMIT;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the server binds to.
    pub addr: SocketAddr,
    /// Per-request deadline. Unset means requests may take as long as they
    /// need.
    pub request_timeout_ms: Option<u64>,
    /// Upper bound for bodies read by [`JsonBody`](crate::middleware::JsonBody).
    pub max_body_bytes: usize,
    /// `tracing-subscriber` `EnvFilter` directive for binaries that install
    /// a subscriber.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            request_timeout_ms: None,
            max_body_bytes: DEFAULT_BODY_LIMIT,
            log_filter: "info".to_owned(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("request_timeout_ms must be greater than 0".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be greater than 0".into()));
        }
        Ok(())
    }
}
