//! Configuration for the temperature bridge.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use venus_bridge_framework::{
    BridgeConfig, BridgeError, DbusConfig, DeviceIdentity, LoggingConfig, Result, RetryPolicy,
    ServiceLayout,
};
use venus_common::path::{split_settings_path, validate_object_path};

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureBridgeConfig {
    /// D-Bus connection settings.
    #[serde(default)]
    pub dbus: DbusConfig,

    /// Published device.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Sampling and retry timing.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Where readings come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The device as it appears on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Well-known name (default: "com.victronenergy.temperature.brass_monkey").
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Registration root (default: "/Settings/Temperature/BrassMonkey").
    #[serde(default = "default_object_path")]
    pub object_path: String,

    /// Device instance (default: 245).
    #[serde(default = "default_device_instance")]
    pub device_instance: i32,

    /// Product id (default: 0xB104).
    #[serde(default = "default_product_id")]
    pub product_id: i32,

    /// Product name (default: "Brass Monkey Fridge Monitor").
    #[serde(default = "default_product_name")]
    pub product_name: String,

    /// Custom name. Falls back to the product name.
    #[serde(default)]
    pub custom_name: Option<String>,

    /// Unit suffix of the text rendering (default: "°C").
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Value published before the first sample (default: 25.0).
    #[serde(default = "default_initial_value")]
    pub initial_value: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            object_path: default_object_path(),
            device_instance: default_device_instance(),
            product_id: default_product_id(),
            product_name: default_product_name(),
            custom_name: None,
            unit: default_unit(),
            initial_value: default_initial_value(),
        }
    }
}

fn default_service_name() -> String {
    "com.victronenergy.temperature.brass_monkey".to_string()
}

fn default_object_path() -> String {
    "/Settings/Temperature/BrassMonkey".to_string()
}

fn default_device_instance() -> i32 {
    245
}

fn default_product_id() -> i32 {
    0xB104
}

fn default_product_name() -> String {
    "Brass Monkey Fridge Monitor".to_string()
}

fn default_unit() -> String {
    "°C".to_string()
}

fn default_initial_value() -> f64 {
    25.0
}

/// Timing of the supervisor loop, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wait after a published sample (default: 5).
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Wait after a failed sample (default: 60).
    #[serde(default = "default_backoff")]
    pub sampling_backoff_secs: u64,

    /// Wait before reconnecting (default: 60).
    #[serde(default = "default_backoff")]
    pub reconnect_delay_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval(),
            sampling_backoff_secs: default_backoff(),
            reconnect_delay_secs: default_backoff(),
        }
    }
}

fn default_sample_interval() -> u64 {
    5
}

fn default_backoff() -> u64 {
    60
}

/// Sample source selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A fixed value, for benches without a probe.
    Simulated {
        #[serde(default = "default_simulated_value")]
        value: f64,
    },
    /// A DS18B20 probe through the Linux w1-therm driver.
    W1Therm {
        #[serde(default = "default_devices_dir")]
        devices_dir: PathBuf,
        #[serde(default = "default_device_prefix")]
        device_prefix: String,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Simulated {
            value: default_simulated_value(),
        }
    }
}

impl SourceConfig {
    /// Short description used for `/Mgmt/Connection`.
    pub fn describe(&self) -> String {
        match self {
            Self::Simulated { .. } => "Simulated".to_string(),
            Self::W1Therm { device_prefix, .. } => format!("1-Wire {}*", device_prefix),
        }
    }
}

fn default_simulated_value() -> f64 {
    22.5
}

fn default_devices_dir() -> PathBuf {
    PathBuf::from("/sys/bus/w1/devices")
}

fn default_device_prefix() -> String {
    "28-".to_string()
}

impl TemperatureBridgeConfig {
    /// Identity of the published device.
    pub fn identity(&self) -> DeviceIdentity {
        let device = &self.device;
        DeviceIdentity {
            device_instance: device.device_instance,
            product_id: device.product_id,
            product_name: device.product_name.clone(),
            custom_name: device
                .custom_name
                .clone()
                .unwrap_or_else(|| device.product_name.clone()),
        }
    }

    /// Where the device lives on the bus.
    pub fn layout(&self, process_name: &str, process_version: &str) -> ServiceLayout {
        ServiceLayout {
            service_name: self.device.service_name.clone(),
            object_path: self.device.object_path.clone(),
            unit: self.device.unit.clone(),
            initial_value: self.device.initial_value,
            process_name: process_name.to_string(),
            process_version: process_version.to_string(),
            connection: self.source.describe(),
        }
    }

    /// Retry policy from the timing section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(
            self.timing.sample_interval_secs,
            self.timing.sampling_backoff_secs,
            self.timing.reconnect_delay_secs,
        )
    }

    /// Upper bound of a single bus call.
    pub fn call_timeout(&self) -> Duration {
        self.dbus.call_timeout()
    }
}

impl BridgeConfig for TemperatureBridgeConfig {
    fn dbus(&self) -> &DbusConfig {
        &self.dbus
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn service_name(&self) -> &str {
        &self.device.service_name
    }

    fn validate(&self) -> Result<()> {
        self.validate_common()?;

        let device = &self.device;
        validate_object_path(&device.object_path)
            .map_err(|e| BridgeError::validation(e.to_string()))?;
        // The root is provisioned through the settings service.
        split_settings_path(&device.object_path)
            .map_err(|e| BridgeError::validation(e.to_string()))?;

        if device.product_name.is_empty() {
            return Err(BridgeError::validation("device.product_name must not be empty"));
        }
        if device.unit.is_empty() {
            return Err(BridgeError::validation("device.unit must not be empty"));
        }
        if !device.initial_value.is_finite() {
            return Err(BridgeError::validation("device.initial_value must be finite"));
        }

        let timing = &self.timing;
        for (name, secs) in [
            ("sample_interval_secs", timing.sample_interval_secs),
            ("sampling_backoff_secs", timing.sampling_backoff_secs),
            ("reconnect_delay_secs", timing.reconnect_delay_secs),
        ] {
            if secs == 0 {
                return Err(BridgeError::validation(format!("timing.{} must be > 0", name)));
            }
        }

        if let SourceConfig::W1Therm { device_prefix, .. } = &self.source {
            if device_prefix.is_empty() {
                return Err(BridgeError::validation("source.device_prefix must not be empty"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: TemperatureBridgeConfig = json5::from_str("{}").unwrap();
        config.validate().unwrap();

        assert_eq!(config.device.service_name, "com.victronenergy.temperature.brass_monkey");
        assert_eq!(config.device.object_path, "/Settings/Temperature/BrassMonkey");
        assert_eq!(config.device.device_instance, 245);
        assert_eq!(config.device.product_id, 0xB104);
        assert_eq!(config.timing.sample_interval_secs, 5);
        assert_eq!(config.timing.sampling_backoff_secs, 60);
        assert_eq!(config.timing.reconnect_delay_secs, 60);
        assert_eq!(config.source, SourceConfig::Simulated { value: 22.5 });
        assert_eq!(config.dbus.call_timeout_ms, 5000);

        let identity = config.identity();
        assert_eq!(identity.custom_name, "Brass Monkey Fridge Monitor");
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            dbus: { bus: "session", address: "tcp:host=192.168.1.10,port=78", call_timeout_ms: 2000 },
            device: {
                service_name: "com.victronenergy.temperature.galley",
                object_path: "/Settings/Temperature/Galley",
                device_instance: 20,
                product_id: 41220,
                product_name: "Galley Probe",
                custom_name: "Galley fridge",
                unit: "°F",
                initial_value: 40.0,
            },
            timing: { sample_interval_secs: 10, sampling_backoff_secs: 30, reconnect_delay_secs: 15 },
            source: { kind: "w1_therm", devices_dir: "/tmp/w1", device_prefix: "10-" },
            logging: { level: "debug", format: "json" },
        }"#;

        let config: TemperatureBridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.identity().custom_name, "Galley fridge");
        assert_eq!(
            config.source,
            SourceConfig::W1Therm {
                devices_dir: PathBuf::from("/tmp/w1"),
                device_prefix: "10-".to_string(),
            }
        );
        assert_eq!(config.call_timeout(), Duration::from_millis(2000));

        let policy = config.retry_policy();
        assert_eq!(policy.sample_interval, Duration::from_secs(10));
        assert_eq!(policy.sampling_backoff, Duration::from_secs(30));
        assert_eq!(policy.reconnect_delay, Duration::from_secs(15));

        let layout = config.layout("venus-bridge-temperature", "0.1.0");
        assert_eq!(layout.unit, "°F");
        assert_eq!(layout.connection, "1-Wire 10-*");
    }

    #[test]
    fn test_validate_zero_interval() {
        let config: TemperatureBridgeConfig =
            json5::from_str("{ timing: { sampling_backoff_secs: 0 } }").unwrap();
        assert!(matches!(config.validate(), Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_validate_root_outside_settings() {
        let config: TemperatureBridgeConfig =
            json5::from_str(r#"{ device: { object_path: "/Temperature/BrassMonkey" } }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_service_name_and_unit() {
        let config: TemperatureBridgeConfig =
            json5::from_str(r#"{ device: { service_name: "brass_monkey" } }"#).unwrap();
        assert!(config.validate().is_err());

        let config: TemperatureBridgeConfig =
            json5::from_str(r#"{ device: { unit: "" } }"#).unwrap();
        assert!(config.validate().is_err());
    }
}
