//! The seam between the registrar and a concrete message bus.
//!
//! [`BusConnector`] opens connections; each [`BusConnection`] is one
//! connection generation. The zbus backend lives in [`crate::dbus`], an
//! in-memory one in [`crate::mock`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::device::DeviceState;

/// Errors reported by a bus backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BusError {
    /// The requested path does not exist.
    #[error("{path} does not exist")]
    NotFound { path: String },

    /// The bus (or the peer service) cannot be reached.
    #[error("bus unavailable: {0}")]
    Unavailable(String),

    /// The call reached the peer but failed.
    #[error("{path}: {message}")]
    Protocol { path: String, message: String },

    /// The call did not complete in time.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

impl BusError {
    /// Create a protocol error for a path.
    pub fn protocol(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this is the "does not exist" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A value stored in the settings tree or published as a constant item.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Int(i32),
    Float(f64),
    Text(String),
}

impl SettingValue {
    /// D-Bus type code used when creating a setting of this kind.
    pub fn type_code(&self) -> &'static str {
        match self {
            SettingValue::Int(_) => "i",
            SettingValue::Float(_) => "f",
            SettingValue::Text(_) => "s",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Int(v) => write!(f, "{}", v),
            SettingValue::Float(v) => write!(f, "{:.1}", v),
            SettingValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Opens connections to a bus.
/// Kind of object exported on the device's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// The live value object backed by a [`DeviceState`].
    Value,
    /// A read-only identity or management item.
    Constant,
}

pub trait BusConnector: Send + Sync + 'static {
    /// Connection type produced by this connector.
    type Connection: BusConnection;

    /// Open a new connection generation.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, BusError>> + Send;
}

/// One live connection to the bus.
///
/// Dropping the connection releases every name and object it owns.
pub trait BusConnection: Send + Sync + 'static {
    /// Read a path from the settings service.
    fn read_setting(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<SettingValue, BusError>> + Send;

    /// Create a path on the settings service with a default value.
    fn create_setting(
        &self,
        path: &str,
        default: &SettingValue,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Claim a well-known name.
    fn request_name(&self, name: &str) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Give up a well-known name.
    fn release_name(&self, name: &str) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Export the live value object backed by `state` at `path`.
    fn export_value(
        &self,
        path: &str,
        state: Arc<DeviceState>,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Export a read-only item at `path`.
    fn export_constant(
        &self,
        path: &str,
        value: SettingValue,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Remove whatever object is exported at `path`.
    fn unexport(
        &self,
        path: &str,
        kind: ObjectKind,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Emit one change notification for the value object at `path`.
    fn emit_changed(
        &self,
        path: &str,
        value: f64,
        text: &str,
    ) -> impl Future<Output = Result<(), BusError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_value_display() {
        assert_eq!(SettingValue::Int(245).to_string(), "245");
        assert_eq!(SettingValue::Float(25.0).to_string(), "25.0");
        assert_eq!(
            SettingValue::from("Brass Monkey Fridge Monitor").to_string(),
            "Brass Monkey Fridge Monitor"
        );
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(SettingValue::from(0xB104).type_code(), "i");
        assert_eq!(SettingValue::from(25.0).type_code(), "f");
        assert_eq!(SettingValue::from("x").type_code(), "s");
    }

    #[test]
    fn test_not_found() {
        assert!(BusError::NotFound { path: "/A".into() }.is_not_found());
        assert!(!BusError::Unavailable("down".into()).is_not_found());
    }
}
