//! Configuration module for watchcast-server.
//!
//! Handles loading configuration from the TOML file and CLI overrides, and
//! turning it into the core crate's config types.

pub mod file;

use crate::config::file::FileConfig;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use watchcast_core::config::{QueueConfig, SessionConfig};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub session: SessionConfig,
    pub queue: QueueConfig,
    pub resources: Vec<String>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and process the configuration.
    ///
    /// A missing file is not an error: the defaults are used. This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str::<FileConfig>(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %self.config_path.display(),
                    "Config file not found, using defaults"
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        let loaded = LoadedConfig {
            listen: file_config.server.listen,
            session: SessionConfig::from(&file_config.session),
            queue: QueueConfig::from(&file_config.queue),
            resources: file_config.watch.resources,
        };
        validate(&loaded)?;
        Ok(loaded)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn validate(config: &LoadedConfig) -> Result<(), ConfigError> {
    let session = &config.session;
    if session.idle_timeout.is_zero() || session.write_timeout.is_zero() {
        return Err(invalid("session timeouts must be greater than zero"));
    }
    if session.write_timeout >= session.idle_timeout {
        return Err(invalid("write_timeout_secs must be shorter than idle_timeout_secs"));
    }
    if session.mailbox_capacity == 0 {
        return Err(invalid("mailbox_capacity must be greater than zero"));
    }
    if session.max_message_size == 0 {
        return Err(invalid("max_message_size must be greater than zero"));
    }

    if config.queue.workers == 0 {
        return Err(invalid("queue workers must be greater than zero"));
    }
    if config.queue.base_delay.is_zero() || config.queue.max_delay < config.queue.base_delay {
        return Err(invalid("queue delays must satisfy 0 < base_delay <= max_delay"));
    }

    if config.resources.is_empty() {
        return Err(invalid("at least one resource must be watched"));
    }
    let mut seen = HashSet::new();
    for resource in &config.resources {
        if resource.trim().is_empty() {
            return Err(invalid("watched resource names must not be empty"));
        }
        if !seen.insert(resource.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "resource {resource} is listed more than once"
            )));
        }
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
