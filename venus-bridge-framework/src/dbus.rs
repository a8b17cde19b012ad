//! zbus backend for the bus seam.
//!
//! Settings live on `com.victronenergy.settings`: every setting is an object
//! implementing `com.victronenergy.BusItem`, and new settings are created
//! through `com.victronenergy.Settings.AddSetting` on `/Settings`.
//!
//! The device itself is exported as `com.victronenergy.BusItem` objects on
//! the bridge's own connection.

use std::collections::HashMap;
use std::sync::Arc;

use venus_common::path::split_settings_path;
use venus_common::{DbusConfig, SETTINGS_ROOT, SETTINGS_SERVICE};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedValue, Value};
use zbus::{Connection, interface};

use crate::bus::{BusConnection, BusConnector, BusError, ObjectKind, SettingValue};
use crate::device::DeviceState;

/// Interface of every Victron bus item.
pub const BUS_ITEM_INTERFACE: &str = "com.victronenergy.BusItem";

/// Interface of the settings service root.
pub const SETTINGS_INTERFACE: &str = "com.victronenergy.Settings";

/// D-Bus error names meaning "this path does not exist".
const NOT_FOUND_ERRORS: [&str; 3] = [
    "org.freedesktop.DBus.Error.UnknownObject",
    "org.freedesktop.DBus.Error.UnknownMethod",
    "org.freedesktop.DBus.Error.UnknownInterface",
];

/// Opens zbus connections from a [`DbusConfig`].
#[derive(Debug, Clone)]
pub struct ZbusConnector {
    config: DbusConfig,
}

impl ZbusConnector {
    pub fn new(config: DbusConfig) -> Self {
        Self { config }
    }
}

impl BusConnector for ZbusConnector {
    type Connection = ZbusConnection;

    async fn connect(&self) -> Result<ZbusConnection, BusError> {
        venus_common::connect(&self.config)
            .await
            .map(|connection| ZbusConnection { connection })
            .map_err(|e| BusError::Unavailable(format!("{} bus: {}", self.config.describe(), e)))
    }
}

/// A live zbus connection.
///
/// Dropping it closes the connection, which releases the claimed name.
#[derive(Debug)]
pub struct ZbusConnection {
    connection: Connection,
}

impl ZbusConnection {
    /// The underlying zbus connection.
    pub fn inner(&self) -> &Connection {
        &self.connection
    }
}

impl BusConnection for ZbusConnection {
    async fn read_setting(&self, path: &str) -> Result<SettingValue, BusError> {
        let reply = self
            .connection
            .call_method(
                Some(SETTINGS_SERVICE),
                path,
                Some(BUS_ITEM_INTERFACE),
                "GetValue",
                &(),
            )
            .await
            .map_err(|e| classify(path, e))?;

        let body = reply.body();
        let value: OwnedValue = body
            .deserialize()
            .map_err(|e| BusError::protocol(path, e.to_string()))?;

        from_variant(&value).ok_or_else(|| {
            BusError::protocol(path, format!("unsupported setting type {}", value.value_signature()))
        })
    }

    async fn create_setting(&self, path: &str, default: &SettingValue) -> Result<(), BusError> {
        let (group, name) =
            split_settings_path(path).map_err(|e| BusError::protocol(path, e.to_string()))?;
        let (min, max) = match default {
            SettingValue::Int(_) => (Value::from(0i32), Value::from(0i32)),
            SettingValue::Float(_) => (Value::from(0.0f64), Value::from(0.0f64)),
            SettingValue::Text(_) => (Value::from(""), Value::from("")),
        };

        let reply = self
            .connection
            .call_method(
                Some(SETTINGS_SERVICE),
                SETTINGS_ROOT,
                Some(SETTINGS_INTERFACE),
                "AddSetting",
                &(
                    group.as_str(),
                    name.as_str(),
                    to_variant(default),
                    default.type_code(),
                    min,
                    max,
                ),
            )
            .await
            .map_err(|e| classify(path, e))?;

        let body = reply.body();
        let status: i32 = body
            .deserialize()
            .map_err(|e| BusError::protocol(path, e.to_string()))?;
        if status != 0 {
            return Err(BusError::protocol(
                path,
                format!("AddSetting returned {}", status),
            ));
        }
        Ok(())
    }

    async fn request_name(&self, name: &str) -> Result<(), BusError> {
        self.connection
            .request_name(name)
            .await
            .map_err(|e| classify(name, e))
    }

    async fn release_name(&self, name: &str) -> Result<(), BusError> {
        self.connection
            .release_name(name)
            .await
            .map(|_| ())
            .map_err(|e| classify(name, e))
    }

    async fn export_value(&self, path: &str, state: Arc<DeviceState>) -> Result<(), BusError> {
        let added = self
            .connection
            .object_server()
            .at(path, ValueItem { state })
            .await
            .map_err(|e| classify(path, e))?;
        if !added {
            return Err(BusError::protocol(path, "object already exported"));
        }
        Ok(())
    }

    async fn export_constant(&self, path: &str, value: SettingValue) -> Result<(), BusError> {
        let added = self
            .connection
            .object_server()
            .at(path, ConstantItem { value })
            .await
            .map_err(|e| classify(path, e))?;
        if !added {
            return Err(BusError::protocol(path, "object already exported"));
        }
        Ok(())
    }

    async fn unexport(&self, path: &str, kind: ObjectKind) -> Result<(), BusError> {
        let server = self.connection.object_server();
        let removed = match kind {
            ObjectKind::Value => server.remove::<ValueItem, _>(path).await,
            ObjectKind::Constant => server.remove::<ConstantItem, _>(path).await,
        };
        removed.map(|_| ()).map_err(|e| classify(path, e))
    }

    async fn emit_changed(&self, path: &str, value: f64, text: &str) -> Result<(), BusError> {
        let emitter =
            SignalEmitter::new(&self.connection, path).map_err(|e| classify(path, e))?;
        ValueItem::properties_changed(&emitter, changes(value, text))
            .await
            .map_err(|e| classify(path, e))
    }
}

/// The live value object.
///
/// `SetValue` and writes to the `Value` property share one path: only finite
/// numbers are accepted, and every accepted write emits `PropertiesChanged`.
pub struct ValueItem {
    state: Arc<DeviceState>,
}

impl ValueItem {
    async fn store_and_notify(&self, value: f64, emitter: &SignalEmitter<'_>) {
        self.state.store(value);
        let text = self.state.text();
        if let Err(e) = Self::properties_changed(emitter, changes(value, &text)).await {
            tracing::warn!(error = %e, "Failed to emit PropertiesChanged after external write");
        }
    }
}

#[interface(name = "com.victronenergy.BusItem")]
impl ValueItem {
    fn get_value(&self) -> Value<'static> {
        Value::from(self.state.value())
    }

    fn get_text(&self) -> String {
        self.state.text()
    }

    /// Returns 0 on success, -1 if the value is not numeric.
    #[zbus(name = "SetValue")]
    async fn set_value_item(
        &self,
        value: OwnedValue,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> i32 {
        let Some(value) = as_f64(&value) else {
            return -1;
        };
        self.store_and_notify(value, &emitter).await;
        0
    }

    #[zbus(property)]
    fn value(&self) -> f64 {
        self.state.value()
    }

    #[zbus(property)]
    async fn set_value(
        &mut self,
        value: f64,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        if !value.is_finite() {
            return Err(zbus::fdo::Error::InvalidArgs(format!(
                "non-finite value {}",
                value
            )));
        }
        self.store_and_notify(value, &emitter).await;
        Ok(())
    }

    #[zbus(property)]
    fn text(&self) -> String {
        self.state.text()
    }

    #[zbus(signal)]
    async fn properties_changed(
        emitter: &SignalEmitter<'_>,
        changes: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<()>;
}

/// A read-only identity or management item.
pub struct ConstantItem {
    value: SettingValue,
}

#[interface(name = "com.victronenergy.BusItem")]
impl ConstantItem {
    fn get_value(&self) -> Value<'static> {
        to_variant(&self.value)
    }

    fn get_text(&self) -> String {
        self.value.to_string()
    }

    #[zbus(name = "SetValue")]
    fn set_value_item(&self, _value: OwnedValue) -> i32 {
        -1
    }

    #[zbus(property)]
    fn value(&self) -> Value<'static> {
        to_variant(&self.value)
    }

    #[zbus(property)]
    fn text(&self) -> String {
        self.value.to_string()
    }
}

fn changes<'a>(value: f64, text: &'a str) -> HashMap<&'static str, Value<'a>> {
    HashMap::from([("Value", Value::from(value)), ("Text", Value::from(text))])
}

fn to_variant(value: &SettingValue) -> Value<'static> {
    match value {
        SettingValue::Int(v) => Value::from(*v),
        SettingValue::Float(v) => Value::from(*v),
        SettingValue::Text(v) => Value::from(v.clone()),
    }
}

fn from_variant(value: &Value<'_>) -> Option<SettingValue> {
    match value {
        Value::I32(v) => Some(SettingValue::Int(*v)),
        Value::I64(v) => i32::try_from(*v).ok().map(SettingValue::Int),
        Value::U32(v) => i32::try_from(*v).ok().map(SettingValue::Int),
        Value::I16(v) => Some(SettingValue::Int(i32::from(*v))),
        Value::U16(v) => Some(SettingValue::Int(i32::from(*v))),
        Value::U8(v) => Some(SettingValue::Int(i32::from(*v))),
        Value::F64(v) => Some(SettingValue::Float(*v)),
        Value::Str(v) => Some(SettingValue::Text(v.as_str().to_string())),
        Value::Value(inner) => from_variant(inner),
        _ => None,
    }
}

fn as_f64(value: &Value<'_>) -> Option<f64> {
    match from_variant(value)? {
        SettingValue::Int(v) => Some(f64::from(v)),
        SettingValue::Float(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

fn classify(path: &str, err: zbus::Error) -> BusError {
    match err {
        zbus::Error::MethodError(ref name, _, _) if NOT_FOUND_ERRORS.contains(&name.as_str()) => {
            BusError::NotFound {
                path: path.to_string(),
            }
        }
        zbus::Error::FDO(ref fdo)
            if matches!(
                **fdo,
                zbus::fdo::Error::UnknownObject(_)
                    | zbus::fdo::Error::UnknownMethod(_)
                    | zbus::fdo::Error::UnknownInterface(_)
            ) =>
        {
            BusError::NotFound {
                path: path.to_string(),
            }
        }
        zbus::Error::InputOutput(e) => BusError::Unavailable(e.to_string()),
        other => BusError::protocol(path, other.to_string()),
    }
}
