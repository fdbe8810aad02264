// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for pwr-server.
//!
//! Config is loaded from the `[pwr-server]` section of `pwr-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./pwr-rs.toml`
//! 3. `~/.config/pwr-rs/pwr-rs.toml`
//! 4. `/etc/pwr-rs/pwr-rs.toml`
//!
//! CLI flags and the `NODE_ID` / `SERVER_URL` / `RMQ_IP` / `IS_PROD`
//! environment variables override file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pwr_app::{default_data_path, normalize_name, ConfigError, ConfigFile};
use pwr_backend::{PRODUCTION_BACKEND, SIMULATED_BACKEND};
use pwr_protocol::queues::{
    DEFAULT_INBOUND_PREFIX, DEFAULT_OUTBOUND_QUEUE, DEFAULT_READER_SERVICE,
};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Identity of this node
    pub node: NodeConfig,
    /// Home server pin configuration API
    pub server: ApiConfig,
    /// Message broker settings
    pub queue: QueueConfig,
    /// Durable scheduled-job store
    pub store: StoreConfig,
    /// GPIO backend selection
    pub gpio: GpioConfig,
    /// Retry and restart behavior
    pub behavior: BehaviorConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Node identity and hardware mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node id as known by the home server
    pub id: String,
    /// Drive real GPIO lines when true; log intended writes otherwise
    pub production: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: "7".to_string(),
            production: false,
        }
    }
}

/// Home server API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// `host:port` or full base URL of the home server
    pub url: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "localhost:2853".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Message broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Broker host
    pub host: String,
    /// Broker AMQP port
    pub port: u16,
    /// Inbound queue prefix; the node id is appended after a colon
    pub inbound_prefix: String,
    /// Shared upstream queue
    pub outbound: String,
    /// Service tag of reader events
    pub reader_service: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            inbound_prefix: DEFAULT_INBOUND_PREFIX.to_string(),
            outbound: DEFAULT_OUTBOUND_QUEUE.to_string(),
            reader_service: DEFAULT_READER_SERVICE.to_string(),
        }
    }
}

impl QueueConfig {
    /// AMQP URI for the default virtual host.
    pub fn amqp_uri(&self) -> String {
        format!("amqp://{}:{}/%2f", self.host, self.port)
    }
}

/// Scheduled-job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file path
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_data_path("jobs.db"),
        }
    }
}

/// GPIO backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// Backend name; derived from `[node].production` when unset
    pub backend: Option<String>,
    /// sysfs GPIO class directory
    pub sysfs_root: PathBuf,
    /// Input sampling period in milliseconds
    pub watch_interval_ms: u64,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: None,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            watch_interval_ms: 20,
        }
    }
}

/// Retry and restart behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// First delay of the config-fetch backoff in milliseconds
    pub retry_base_delay_ms: u64,
    /// Cap of the config-fetch backoff in milliseconds
    pub retry_max_delay_ms: u64,
    /// Pause before rebooting the controller after a fatal error
    pub restart_delay_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            restart_delay_ms: 1_000,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.node.id.trim().is_empty() {
            return Err("[node].id must not be empty".to_string());
        }
        if self.server.url.trim().is_empty() {
            return Err("[server].url must not be empty".to_string());
        }
        if self.server.request_timeout_ms == 0 {
            return Err("[server].request_timeout_ms must be > 0".to_string());
        }

        if self.queue.host.trim().is_empty() {
            return Err("[queue].host must not be empty".to_string());
        }
        if self.queue.port == 0 {
            return Err("[queue].port must be > 0".to_string());
        }
        if self.queue.inbound_prefix.trim().is_empty() || self.queue.outbound.trim().is_empty() {
            return Err("[queue].inbound_prefix and [queue].outbound must not be empty".to_string());
        }

        if self.store.path.as_os_str().is_empty() {
            return Err("[store].path must not be empty".to_string());
        }

        let backend = normalize_name(&self.backend_name());
        if backend != PRODUCTION_BACKEND && backend != SIMULATED_BACKEND {
            return Err(format!(
                "[gpio].backend '{}' is unknown (expected {} or {})",
                backend, PRODUCTION_BACKEND, SIMULATED_BACKEND
            ));
        }
        if self.gpio.watch_interval_ms == 0 {
            return Err("[gpio].watch_interval_ms must be > 0".to_string());
        }

        if self.behavior.retry_base_delay_ms == 0 {
            return Err("[behavior].retry_base_delay_ms must be > 0".to_string());
        }
        if self.behavior.retry_max_delay_ms < self.behavior.retry_base_delay_ms {
            return Err(
                "[behavior].retry_max_delay_ms must be >= retry_base_delay_ms".to_string(),
            );
        }
        if self.behavior.restart_delay_ms == 0 {
            return Err("[behavior].restart_delay_ms must be > 0".to_string());
        }
        Ok(())
    }

    /// Backend to instantiate: explicit `[gpio].backend`, else chosen by mode.
    pub fn backend_name(&self) -> String {
        match self.gpio.backend.as_deref() {
            Some(name) => name.to_string(),
            None if self.node.production => PRODUCTION_BACKEND.to_string(),
            None => SIMULATED_BACKEND.to_string(),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        <Self as ConfigFile>::load_from_file(path)
    }

    /// Load configuration from the default search paths.
    /// Returns default config if no config file is found.
    pub fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        <Self as ConfigFile>::load_from_default_paths()
    }

    /// Generate an example configuration wrapped under the `[pwr-server]`
    /// section header, suitable for use in a combined `pwr-rs.toml` file.
    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "pwr-server")]
            inner: ServerConfig,
        }
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            node: NodeConfig {
                id: "7".to_string(),
                production: true,
            },
            server: ApiConfig::default(),
            queue: QueueConfig::default(),
            store: StoreConfig {
                path: PathBuf::from("/var/lib/pwr-rs/jobs.db"),
            },
            gpio: GpioConfig::default(),
            behavior: BehaviorConfig::default(),
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "pwr-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.node.id, "7");
        assert!(!config.node.production);
        assert_eq!(config.server.url, "localhost:2853");
        assert_eq!(config.queue.host, "localhost");
        assert_eq!(config.queue.inbound_prefix, "Power_Write");
        assert_eq!(config.queue.outbound, "Server");
        assert_eq!(config.queue.reader_service, "Power_Read");
        assert_eq!(config.backend_name(), "dummy");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[node]
id = "12"
production = true
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.node.id, "12");
        assert_eq!(config.backend_name(), "sysfs");
        assert_eq!(config.queue.port, 5672);
        assert_eq!(config.gpio.watch_interval_ms, 20);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[node]
id = "3"
production = true

[server]
url = "http://10.0.0.2:2853"
request_timeout_ms = 2500

[queue]
host = "10.0.0.2"
port = 5673

[store]
path = "/tmp/jobs.db"

[gpio]
backend = "dummy"
watch_interval_ms = 50

[behavior]
retry_base_delay_ms = 100
retry_max_delay_ms = 1000
restart_delay_ms = 200
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.server.request_timeout_ms, 2500);
        assert_eq!(config.queue.amqp_uri(), "amqp://10.0.0.2:5673/%2f");
        assert_eq!(config.store.path, PathBuf::from("/tmp/jobs.db"));
        // An explicit backend wins over the production flag.
        assert_eq!(config.backend_name(), "dummy");
    }

    #[test]
    fn test_example_combined_toml_parses() {
        let example = ServerConfig::example_combined_toml();
        let table: toml::Table = toml::from_str(&example).unwrap();
        let section = table.get("pwr-server").expect("section");
        let config: ServerConfig = toml::from_str(&toml::to_string(section).unwrap()).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.node.production);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.node.id = " ".to_string();
        assert!(config.validate().unwrap_err().contains("[node].id"));

        let mut config = ServerConfig::default();
        config.general.log_level = Some("chatty".to_string());
        assert!(config.validate().unwrap_err().contains("log_level"));

        let mut config = ServerConfig::default();
        config.behavior.retry_max_delay_ms = 10;
        assert!(config.validate().unwrap_err().contains("retry_max_delay_ms"));

        let mut config = ServerConfig::default();
        config.gpio.backend = Some("gpiochip".to_string());
        assert!(config.validate().unwrap_err().contains("[gpio].backend"));

        let mut config = ServerConfig::default();
        config.gpio.backend = Some("SysFS".to_string());
        assert!(config.validate().is_ok());

        let mut config = ServerConfig::default();
        config.gpio.watch_interval_ms = 0;
        assert!(config.validate().unwrap_err().contains("watch_interval_ms"));
    }
}
