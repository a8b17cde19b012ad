//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{DbusConfig, LoggingConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use venus_bridge_framework::{BridgeConfig, DbusConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub dbus: DbusConfig,
///     pub logging: LoggingConfig,
///     pub device: MyDeviceConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn dbus(&self) -> &DbusConfig {
///         &self.dbus
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn service_name(&self) -> &str {
///         &self.device.service_name
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the D-Bus configuration.
    fn dbus(&self) -> &DbusConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the well-known name this bridge claims.
    fn service_name(&self) -> &str;

    /// Checks every bridge needs: a valid service name and a non-zero call timeout.
    fn validate_common(&self) -> Result<()> {
        venus_common::path::validate_service_name(self.service_name())
            .map_err(|e| BridgeError::validation(e.to_string()))?;

        if self.dbus().call_timeout_ms == 0 {
            return Err(BridgeError::validation("dbus.call_timeout_ms must be > 0"));
        }

        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Overrides should call
    /// [`validate_common`](Self::validate_common).
    fn validate(&self) -> Result<()> {
        self.validate_common()
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        dbus: DbusConfig,
        #[serde(default)]
        logging: LoggingConfig,
        service_name: String,
    }

    impl BridgeConfig for TestConfig {
        fn dbus(&self) -> &DbusConfig {
            &self.dbus
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn service_name(&self) -> &str {
            &self.service_name
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_and_validate() {
        let dir = std::env::temp_dir().join(format!("venus-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let good = dir.join("good.json5");
        std::fs::write(&good, r#"{ service_name: "com.victronenergy.temperature.test" }"#).unwrap();
        let config = TestConfig::load(&good).unwrap();
        assert_eq!(config.dbus.call_timeout_ms, 5000);

        let bad_name = dir.join("bad_name.json5");
        std::fs::write(&bad_name, r#"{ service_name: "temperature" }"#).unwrap();
        assert!(matches!(
            TestConfig::load(&bad_name),
            Err(BridgeError::ConfigValidation(_))
        ));

        let zero_timeout = dir.join("zero_timeout.json5");
        std::fs::write(
            &zero_timeout,
            r#"{ service_name: "com.victronenergy.temperature.test", dbus: { call_timeout_ms: 0 } }"#,
        )
        .unwrap();
        assert!(matches!(
            TestConfig::load(&zero_timeout),
            Err(BridgeError::ConfigValidation(_))
        ));

        let garbage = dir.join("garbage.json5");
        std::fs::write(&garbage, "{ service_name: ").unwrap();
        assert!(matches!(
            TestConfig::load(&garbage),
            Err(BridgeError::ConfigParse(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
