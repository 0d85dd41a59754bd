//! TOML configuration for the hub server.
//!
//! The file is optional.  Every field has a serde default, so an empty file,
//! a file with only some sections, and no file at all are all valid:
//!
//! ```toml
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 8080
//!
//! [hub]
//! serial_port = "/dev/ttyACM0"
//! baud_rate = 115200
//! settle_secs = 5
//! cadence_ms = 40
//! reopen_delay_secs = 2
//! neutral_grace_ms = 500
//! priority = 0
//!
//! [session]
//! status_interval_ms = 1000
//! linger_ms = 500
//! status_source = "observed"
//! ```
//!
//! # Serde default values (for beginners)
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take the value of
//! `some_fn()` when absent.  A section annotated with `#[serde(default)]`
//! falls back to its `Default` impl when the whole table is missing.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::application::handle_connection::{SessionConfig, StatusSource};
use crate::infrastructure::serial::sync_loop::{SyncConfig, MIN_SETTLE};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

/// TCP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Serial link and sync loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubConfig {
    /// Device path.  When absent the first USB device that identifies as an
    /// Arduino is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Wait after opening the link before the first frame.  Values below 5
    /// are raised to 5.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,
    /// Pause between failed open attempts.
    #[serde(default = "default_reopen_delay_secs")]
    pub reopen_delay_secs: u64,
    /// How long the neutral state is streamed before the loop stops.
    #[serde(default = "default_neutral_grace_ms")]
    pub neutral_grace_ms: u64,
    #[serde(default)]
    pub priority: u8,
}

/// Per-connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
    #[serde(default)]
    pub status_source: StatusSource,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_baud_rate() -> u32 {
    115_200
}
fn default_settle_secs() -> u64 {
    5
}
fn default_cadence_ms() -> u64 {
    40
}
fn default_reopen_delay_secs() -> u64 {
    2
}
fn default_neutral_grace_ms() -> u64 {
    500
}
fn default_status_interval_ms() -> u64 {
    1000
}
fn default_linger_ms() -> u64 {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            hub: HubConfig::default(),
            session: SessionSettings::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            baud_rate: default_baud_rate(),
            settle_secs: default_settle_secs(),
            cadence_ms: default_cadence_ms(),
            reopen_delay_secs: default_reopen_delay_secs(),
            neutral_grace_ms: default_neutral_grace_ms(),
            priority: 0,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval_ms(),
            linger_ms: default_linger_ms(),
            status_source: StatusSource::default(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl ServerConfig {
    /// Socket address the acceptor binds to.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidBindAddress`] if `bind_address` is not an IP
    /// address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .network
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.network.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.network.port))
    }

    /// Sync loop timing, with the settle interval raised to its minimum.
    pub fn sync_config(&self) -> SyncConfig {
        let mut settle = Duration::from_secs(self.hub.settle_secs);
        if settle < MIN_SETTLE {
            warn!(
                "settle_secs = {} is below the minimum, using {}",
                self.hub.settle_secs,
                MIN_SETTLE.as_secs()
            );
            settle = MIN_SETTLE;
        }
        SyncConfig {
            settle,
            cadence: Duration::from_millis(self.hub.cadence_ms.max(1)),
            reopen_delay: Duration::from_secs(self.hub.reopen_delay_secs),
            neutral_grace: Duration::from_millis(self.hub.neutral_grace_ms),
            priority: self.hub.priority,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            status_interval: Duration::from_millis(self.session.status_interval_ms.max(1)),
            linger: Duration::from_millis(self.session.linger_ms),
            status_source: self.session.status_source,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses configuration text.
///
/// # Errors
///
/// [`ConfigError::Parse`] if the TOML is malformed or a field has the wrong
/// type.
pub fn parse_config(text: &str) -> Result<ServerConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Loads the configuration file at `path`, or defaults when `path` is `None`.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`] if
/// it is malformed.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        // Arrange / Act
        let cfg = parse_config("").unwrap();

        // Assert
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.network.port, 8080);
        assert_eq!(cfg.hub.baud_rate, 115_200);
        assert_eq!(cfg.hub.serial_port, None);
        assert_eq!(cfg.session.status_source, StatusSource::Observed);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg = parse_config(
            r#"
            [hub]
            serial_port = "/dev/ttyUSB3"
            cadence_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(cfg.hub.serial_port.as_deref(), Some("/dev/ttyUSB3"));
        assert_eq!(cfg.hub.cadence_ms, 50);
        assert_eq!(cfg.hub.reopen_delay_secs, 2);
        assert_eq!(cfg.network, NetworkConfig::default());
    }

    #[test]
    fn test_status_source_parses_lowercase() {
        let cfg = parse_config("[session]\nstatus_source = \"desired\"\n").unwrap();

        assert_eq!(cfg.session_config().status_source, StatusSource::Desired);
    }

    #[test]
    fn test_short_settle_is_raised_to_minimum() {
        let cfg = parse_config("[hub]\nsettle_secs = 1\n").unwrap();

        assert_eq!(cfg.sync_config().settle, MIN_SETTLE);
    }

    #[test]
    fn test_longer_settle_is_kept() {
        let cfg = parse_config("[hub]\nsettle_secs = 8\n").unwrap();

        assert_eq!(cfg.sync_config().settle, Duration::from_secs(8));
    }

    #[test]
    fn test_sync_config_defaults_match_hub_timing() {
        let sync = ServerConfig::default().sync_config();

        assert_eq!(sync.cadence, Duration::from_millis(40));
        assert_eq!(sync.reopen_delay, Duration::from_secs(2));
        assert_eq!(sync.neutral_grace, Duration::from_millis(500));
        assert_eq!(sync.priority, 0);
    }

    #[test]
    fn test_bind_addr_combines_address_and_port() {
        let mut cfg = ServerConfig::default();
        cfg.network.bind_address = "127.0.0.1".into();
        cfg.network.port = 9000;

        assert_eq!(cfg.bind_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn test_bind_addr_rejects_hostname() {
        let mut cfg = ServerConfig::default();
        cfg.network.bind_address = "localhost".into();

        assert!(matches!(cfg.bind_addr(), Err(ConfigError::InvalidBindAddress(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        assert!(matches!(parse_config("[network\nport ="), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        assert!(matches!(
            parse_config("[network]\nport = \"eighty\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_path_loads_defaults() {
        assert_eq!(load_config(None).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_unreadable_path_is_io_error() {
        let result = load_config(Some(Path::new("/nonexistent/rokenbok/server.toml")));

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut cfg = ServerConfig::default();
        cfg.hub.serial_port = Some("COM4".into());
        cfg.session.status_source = StatusSource::Desired;

        let text = toml::to_string_pretty(&cfg).expect("serialize");

        assert_eq!(parse_config(&text).unwrap(), cfg);
    }
}
