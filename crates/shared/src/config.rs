//! Runtime configuration loader.
//!
//! Loads tuning knobs from environment variables, with an optional `.env`
//! file taking precedence for local development.
//!
//! ## Environment variables
//!
//! - `HEARTH_TOPIC_BUFFER` — per-topic transport buffer size (default 256)
//! - `HEARTH_QUERY_TIMEOUT_MS` — default query timeout in milliseconds
//!   (default 5000)
//! - `HEARTH_LOG_FILTER` — tracing filter directive (default "info")

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load env file {path}: {source}")]
    EnvFileLoad {
        path: PathBuf,
        source: dotenv::Error,
    },
    #[error("Invalid value for {variable}: {reason}")]
    InvalidValue { variable: String, reason: String },
}

/// Tuning knobs for the in-process CQRS runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Bounded buffer size for each transport topic
    pub topic_buffer: usize,
    /// Default deadline applied to queries sent without an explicit timeout
    pub default_query_timeout_ms: u64,
    /// Default tracing filter directive
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            topic_buffer: 256,
            default_query_timeout_ms: 5_000,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            topic_buffer: read_parsed("HEARTH_TOPIC_BUFFER", defaults.topic_buffer)?,
            default_query_timeout_ms: read_parsed(
                "HEARTH_QUERY_TIMEOUT_MS",
                defaults.default_query_timeout_ms,
            )?,
            log_filter: std::env::var("HEARTH_LOG_FILTER").unwrap_or(defaults.log_filter),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.topic_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                variable: "HEARTH_TOPIC_BUFFER".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.default_query_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                variable: "HEARTH_QUERY_TIMEOUT_MS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn read_parsed<T: std::str::FromStr>(variable: &str, default: T) -> Result<T> {
    match std::env::var(variable) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            variable: variable.to_string(),
            reason: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration loader with optional `.env` file support.
///
/// Values from the `.env` file are exported into the process environment
/// before `RuntimeConfig::from_env` reads them.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    env_file_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(env_file_path: Option<PathBuf>) -> Self {
        Self { env_file_path }
    }

    pub fn load(&self) -> Result<RuntimeConfig> {
        if let Some(path) = &self.env_file_path {
            self.load_env_file(path)?;
        }
        let config = RuntimeConfig::from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_env_file(&self, path: &Path) -> Result<()> {
        dotenv::from_path(path).map_err(|e| ConfigError::EnvFileLoad {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
