//! TOML file configuration structures.
//!
//! These structs directly map to the `watchcast.toml` file format. Every
//! field is optional; missing values take the built-in defaults.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use watchcast_core::config::{QueueConfig, SessionConfig};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub session: SessionSection,
    pub queue: QueueSection,
    pub watch: WatchSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    pub listen: SocketAddr,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
        }
    }
}

/// Per-session tunables. Reloadable via SIGHUP; applies to new sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub idle_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub mailbox_capacity: usize,
    pub max_message_size: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            idle_timeout_secs: defaults.idle_timeout.as_secs(),
            write_timeout_secs: defaults.write_timeout.as_secs(),
            mailbox_capacity: defaults.mailbox_capacity,
            max_message_size: defaults.max_message_size,
        }
    }
}

impl From<&SessionSection> for SessionConfig {
    fn from(section: &SessionSection) -> Self {
        SessionConfig {
            idle_timeout: Duration::from_secs(section.idle_timeout_secs),
            write_timeout: Duration::from_secs(section.write_timeout_secs),
            mailbox_capacity: section.mailbox_capacity,
            max_message_size: section.max_message_size,
        }
    }
}

/// Retry queue and dispatch worker tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    pub workers: usize,
}

impl Default for QueueSection {
    fn default() -> Self {
        let defaults = QueueConfig::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_secs: defaults.max_delay.as_secs(),
            workers: defaults.workers,
        }
    }
}

impl From<&QueueSection> for QueueConfig {
    fn from(section: &QueueSection) -> Self {
        QueueConfig {
            max_retries: section.max_retries,
            base_delay: Duration::from_millis(section.base_delay_ms),
            max_delay: Duration::from_secs(section.max_delay_secs),
            workers: section.workers,
        }
    }
}

/// Resource types to watch. One pipeline runs per entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub resources: Vec<String>,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            resources: vec!["pods".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[session]
idle_timeout_secs = 30
write_timeout_secs = 5
mailbox_capacity = 64
max_message_size = 2048

[queue]
max_retries = 3
base_delay_ms = 10
max_delay_secs = 60
workers = 2

[watch]
resources = ["pods", "deployments"]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.session.mailbox_capacity, 64);
        assert_eq!(config.queue.workers, 2);
        assert_eq!(config.watch.resources, vec!["pods", "deployments"]);

        let session = SessionConfig::from(&config.session);
        assert_eq!(session.idle_timeout, Duration::from_secs(30));
        assert_eq!(session.write_timeout, Duration::from_secs(5));

        let queue = QueueConfig::from(&config.queue);
        assert_eq!(queue.base_delay, Duration::from_millis(10));
        assert_eq!(queue.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.session.idle_timeout_secs, 55);
        assert_eq!(config.session.write_timeout_secs, 10);
        assert_eq!(config.session.mailbox_capacity, 256);
        assert_eq!(config.session.max_message_size, 1024);
        assert_eq!(config.queue.max_retries, 5);
        assert_eq!(config.queue.base_delay_ms, 5);
        assert_eq!(config.queue.max_delay_secs, 1000);
        assert_eq!(config.queue.workers, 1);
    }

    #[test]
    fn test_partial_section() {
        let config: FileConfig = toml::from_str("[session]\nidle_timeout_secs = 20\n").unwrap();
        assert_eq!(config.session.idle_timeout_secs, 20);
        assert_eq!(config.session.mailbox_capacity, 256);
    }
}
