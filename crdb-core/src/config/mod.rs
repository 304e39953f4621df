//! Configuration management for CRDB
//!
//! Environment-based configuration with defaults and validation. Every
//! value has a working default so a bare `crdb-server` starts without any
//! environment set up.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Swarm (content-addressed replication) configuration
    pub swarm: SwarmConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Maximum accepted frame size in bytes
    pub max_frame_size: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the file storage provider
    pub data_dir: PathBuf,
}

/// Swarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Whether the content-addressed storage provider is registered
    pub enabled: bool,

    /// How long a restore waits on peer retrieval before closing the sink
    #[serde(with = "humantime_serde")]
    pub gather_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (trace, debug, info, warn, error)
    pub level: String,

    /// Emit JSON formatted log lines
    pub json_format: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind_address: "127.0.0.1:9010".parse().expect("static address"),
                max_frame_size: 64 * 1024,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("./data"),
            },
            swarm: SwarmConfig {
                enabled: true,
                gather_timeout: Duration::from_secs(5),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables, using defaults for
    /// anything unset.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `CRDB_BIND_ADDRESS` | server bind address |
    /// | `CRDB_MAX_FRAME_SIZE` | maximum frame size in bytes |
    /// | `CRDB_DATA_DIR` | file store base directory |
    /// | `CRDB_SWARM_ENABLED` | register the swarm provider (`true`/`false`) |
    /// | `CRDB_GATHER_TIMEOUT_MS` | peer gather timeout in milliseconds |
    /// | `CRDB_LOG_LEVEL` | minimum log level |
    /// | `CRDB_LOG_JSON` | JSON log output (`true`/`false`) |
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(addr) = env::var("CRDB_BIND_ADDRESS") {
            config.server.bind_address = addr.parse().map_err(|_| ConfigError::InvalidValue {
                variable: "CRDB_BIND_ADDRESS".to_string(),
                reason: format!("not a socket address: {}", addr),
            })?;
        }

        if let Ok(size) = env::var("CRDB_MAX_FRAME_SIZE") {
            config.server.max_frame_size =
                size.parse().map_err(|_| ConfigError::InvalidValue {
                    variable: "CRDB_MAX_FRAME_SIZE".to_string(),
                    reason: format!("not a byte count: {}", size),
                })?;
        }

        if let Ok(dir) = env::var("CRDB_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }

        if let Ok(enabled) = env::var("CRDB_SWARM_ENABLED") {
            config.swarm.enabled = parse_bool("CRDB_SWARM_ENABLED", &enabled)?;
        }

        if let Ok(ms) = env::var("CRDB_GATHER_TIMEOUT_MS") {
            let millis: u64 = ms.parse().map_err(|_| ConfigError::InvalidValue {
                variable: "CRDB_GATHER_TIMEOUT_MS".to_string(),
                reason: format!("not a millisecond count: {}", ms),
            })?;
            config.swarm.gather_timeout = Duration::from_millis(millis);
        }

        if let Ok(level) = env::var("CRDB_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(json) = env::var("CRDB_LOG_JSON") {
            config.logging.json_format = parse_bool("CRDB_LOG_JSON", &json)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the system relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_frame_size < 1024 {
            return Err(ConfigError::Validation(
                "max_frame_size must be at least 1024 bytes".to_string(),
            ));
        }

        if self.swarm.gather_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "gather_timeout must be non-zero".to_string(),
            ));
        }

        if crate::logging::LogLevel::parse(&self.logging.level).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn parse_bool(variable: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            variable: variable.to_string(),
            reason: format!("not a boolean: {}", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.swarm.gather_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_tiny_frames() {
        let mut config = Config::default();
        config.server.max_frame_size = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.swarm.gather_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
