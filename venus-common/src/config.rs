use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Which message bus to attach to when no explicit address is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// The system-wide bus (default, used on GX devices).
    #[default]
    System,
    /// The per-login session bus, handy for local testing.
    Session,
}

impl std::fmt::Display for BusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusKind::System => write!(f, "system"),
            BusKind::Session => write!(f, "session"),
        }
    }
}

/// Common D-Bus connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbusConfig {
    /// Bus to connect to: "system" or "session".
    #[serde(default)]
    pub bus: BusKind,

    /// Explicit bus address (e.g. `tcp:host=192.168.1.10,port=78`).
    /// Takes precedence over `bus` when set.
    #[serde(default)]
    pub address: Option<String>,

    /// Upper bound for every individual bus call, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_call_timeout_ms() -> u64 {
    5000
}

impl Default for DbusConfig {
    fn default() -> Self {
        Self {
            bus: BusKind::default(),
            address: None,
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl DbusConfig {
    /// The per-call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Human-readable description of the target bus, for logging.
    pub fn describe(&self) -> String {
        match &self.address {
            Some(address) => address.clone(),
            None => self.bus.to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Base configuration shared by all bridges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseConfig {
    /// D-Bus connection settings.
    #[serde(default)]
    pub dbus: DbusConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_config() {
        let json5 = r#"
        {
            dbus: {
                bus: "session",
                call_timeout_ms: 250,
            },
            logging: {
                level: "debug",
            },
        }
        "#;

        let config: BaseConfig = parse_config(json5).unwrap();

        assert_eq!(config.dbus.bus, BusKind::Session);
        assert_eq!(config.dbus.call_timeout(), Duration::from_millis(250));
        assert!(config.dbus.address.is_none());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_default_config() {
        let config: BaseConfig = parse_config("{}").unwrap();

        assert_eq!(config.dbus.bus, BusKind::System);
        assert_eq!(config.dbus.call_timeout_ms, 5000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_address_overrides_bus_in_description() {
        let json5 = r#"{ dbus: { address: "tcp:host=192.168.1.10,port=78" } }"#;
        let config: BaseConfig = parse_config(json5).unwrap();

        assert_eq!(config.dbus.describe(), "tcp:host=192.168.1.10,port=78");
        assert_eq!(DbusConfig::default().describe(), "system");
    }

    #[test]
    fn test_json_logging_format() {
        let json5 = r#"{ logging: { level: "debug", format: "json" } }"#;
        let config: BaseConfig = parse_config(json5).unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_missing_file() {
        let result: Result<BaseConfig> = load_config("/nonexistent/venus.json5");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
