//! Bus registration of a single device.
//!
//! The [`Registrar`] owns the way onto the bus: it opens connection
//! generations, provisions the settings a consumer expects to find under the
//! registration root, and exports the device object.
//!
//! # Provisioning order
//!
//! 1. Ensure the registration root exists (created with the initial value).
//! 2. Claim the service name and export the value object at the root.
//! 3. Ensure `DeviceInstance`, `ProductId`, `ProductName`, `CustomName`
//!    below the root, in that order.
//! 4. Publish the read-only identity and management items on the service.
//!
//! A failure anywhere rolls back everything exported so far and surfaces as
//! [`BridgeError::BusUnavailable`].
//!
//! # Example
//!
//! ```ignore
//! let registrar = Registrar::new(connector, identity, layout);
//!
//! let session = registrar.connect().await?;
//! let mut device = registrar.export_device(session).await?;
//!
//! device.set_value(22.5).await?;
//! assert_eq!(device.get_text(), "22.5 °C");
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use venus_common::path;

use crate::bus::{BusConnection, BusConnector, BusError, ObjectKind, SettingValue};
use crate::device::DeviceState;
use crate::error::{BridgeError, Result};

/// Settings below the registration root, in provisioning order.
pub const DEVICE_INSTANCE: &str = "DeviceInstance";
pub const PRODUCT_ID: &str = "ProductId";
pub const PRODUCT_NAME: &str = "ProductName";
pub const CUSTOM_NAME: &str = "CustomName";

/// Immutable identity of the published device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Device instance number, unique per device class on the bus.
    pub device_instance: i32,
    /// Product id.
    pub product_id: i32,
    /// Product name.
    pub product_name: String,
    /// User-facing name; defaults to the product name.
    pub custom_name: String,
}

impl DeviceIdentity {
    /// The metadata settings with their defaults, in provisioning order.
    pub fn settings(&self) -> [(&'static str, SettingValue); 4] {
        [
            (DEVICE_INSTANCE, SettingValue::Int(self.device_instance)),
            (PRODUCT_ID, SettingValue::Int(self.product_id)),
            (PRODUCT_NAME, SettingValue::Text(self.product_name.clone())),
            (CUSTOM_NAME, SettingValue::Text(self.custom_name.clone())),
        ]
    }
}

/// Where and how the device appears on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLayout {
    /// Well-known name claimed for the device.
    pub service_name: String,
    /// Registration root; the value object is exported here.
    pub object_path: String,
    /// Unit suffix of the `Text` rendering.
    pub unit: String,
    /// Value published until the first sample arrives.
    pub initial_value: f64,
    /// Published at `/Mgmt/ProcessName`.
    pub process_name: String,
    /// Published at `/Mgmt/ProcessVersion`.
    pub process_version: String,
    /// Published at `/Mgmt/Connection`.
    pub connection: String,
}

impl ServiceLayout {
    /// Path of a metadata setting below the registration root.
    pub fn setting_path(&self, name: &str) -> String {
        path::join(&self.object_path, name)
    }
}

/// Outcome of [`Registrar::ensure_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The path was already there; nothing was written.
    Existing,
    /// The path was missing and has been created with the default.
    Created,
}

/// One connection generation, not yet carrying an exported device.
///
/// [`Registrar::export_device`] consumes it, so a generation can be exported
/// at most once.
#[derive(Debug)]
pub struct BusSession<B> {
    connection: B,
    generation: u64,
}

impl<B: BusConnection> BusSession<B> {
    /// The underlying connection.
    pub fn connection(&self) -> &B {
        &self.connection
    }

    /// Sequence number of this connection generation, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Opens connections and registers the device on them.
#[derive(Debug)]
pub struct Registrar<C: BusConnector> {
    connector: C,
    identity: DeviceIdentity,
    layout: ServiceLayout,
    call_timeout: Duration,
    generations: AtomicU64,
}

impl<C: BusConnector> Registrar<C> {
    /// Create a registrar with a 5 second per-call timeout.
    pub fn new(connector: C, identity: DeviceIdentity, layout: ServiceLayout) -> Self {
        Self {
            connector,
            identity,
            layout,
            call_timeout: Duration::from_secs(5),
            generations: AtomicU64::new(0),
        }
    }

    /// Set the upper bound applied to every individual bus call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// The service layout.
    pub fn layout(&self) -> &ServiceLayout {
        &self.layout
    }

    /// Open a new connection generation.
    pub async fn connect(&self) -> Result<BusSession<C::Connection>> {
        let connection = bounded(self.call_timeout, "connect", self.connector.connect())
            .await
            .map_err(|e| BridgeError::BusUnavailable(e.to_string()))?;

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(generation, "Connected to bus");

        Ok(BusSession {
            connection,
            generation,
        })
    }

    /// Make sure a settings path exists, creating it with `default` if it does not.
    ///
    /// An existing path is never overwritten. Read failures other than
    /// "does not exist" are returned as [`BridgeError::BusProtocol`].
    pub async fn ensure_path(
        &self,
        connection: &C::Connection,
        path: &str,
        default: &SettingValue,
    ) -> Result<Provisioned> {
        match bounded(self.call_timeout, "GetValue", connection.read_setting(path)).await {
            Ok(current) => {
                tracing::debug!(path = %path, value = %current, "Setting present");
                Ok(Provisioned::Existing)
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(path = %path, default = %default, "Setting missing, creating");
                bounded(
                    self.call_timeout,
                    "AddSetting",
                    connection.create_setting(path, default),
                )
                .await
                .map_err(|e| protocol_error(path, e))?;
                Ok(Provisioned::Created)
            }
            Err(e) => Err(protocol_error(path, e)),
        }
    }

    /// Claim the service name, export the device object and provision its metadata.
    ///
    /// Consumes the session: after a failure, or once the returned handle
    /// reports a push failure, a fresh [`connect`](Self::connect) is needed.
    pub async fn export_device(
        &self,
        session: BusSession<C::Connection>,
    ) -> Result<DeviceHandle<C::Connection>> {
        self.export_device_at(session, self.layout.initial_value).await
    }

    /// Like [`export_device`](Self::export_device), but the exported object
    /// starts at `value` instead of the configured initial value.
    ///
    /// Used after a reconnect so consumers keep seeing the last published
    /// reading.
    pub async fn export_device_at(
        &self,
        session: BusSession<C::Connection>,
        value: f64,
    ) -> Result<DeviceHandle<C::Connection>> {
        let BusSession {
            connection,
            generation,
        } = session;
        let state = Arc::new(DeviceState::new(value, self.layout.unit.clone()));
        let mut exports = Exports::default();

        if let Err(e) = self.provision(&connection, &state, &mut exports).await {
            tracing::error!(
                generation,
                service = %self.layout.service_name,
                error = %e,
                "Device export failed, rolling back"
            );
            self.roll_back(&connection, exports).await;
            return Err(BridgeError::BusUnavailable(format!(
                "device export failed: {}",
                e
            )));
        }

        tracing::info!(
            generation,
            service = %self.layout.service_name,
            path = %self.layout.object_path,
            device_instance = self.identity.device_instance,
            value,
            "Device exported"
        );

        Ok(DeviceHandle {
            connection,
            state,
            object_path: self.layout.object_path.clone(),
            generation,
            call_timeout: self.call_timeout,
        })
    }

    async fn provision(
        &self,
        connection: &C::Connection,
        state: &Arc<DeviceState>,
        exports: &mut Exports,
    ) -> Result<()> {
        let root = &self.layout.object_path;

        self.ensure_path(
            connection,
            root,
            &SettingValue::Float(self.layout.initial_value),
        )
        .await?;

        let name = &self.layout.service_name;
        bounded(self.call_timeout, "RequestName", connection.request_name(name))
            .await
            .map_err(|e| protocol_error(name, e))?;
        exports.name = Some(name.clone());

        bounded(
            self.call_timeout,
            "export",
            connection.export_value(root, Arc::clone(state)),
        )
        .await
        .map_err(|e| protocol_error(root, e))?;
        exports.objects.push((root.clone(), ObjectKind::Value));

        for (setting, default) in self.identity.settings() {
            let path = self.layout.setting_path(setting);
            self.ensure_path(connection, &path, &default).await?;
        }

        for (path, value) in self.service_items() {
            bounded(
                self.call_timeout,
                "export",
                connection.export_constant(&path, value),
            )
            .await
            .map_err(|e| protocol_error(&path, e))?;
            exports.objects.push((path, ObjectKind::Constant));
        }

        Ok(())
    }

    async fn roll_back(&self, connection: &C::Connection, exports: Exports) {
        for (path, kind) in exports.objects.iter().rev() {
            if let Err(e) = bounded(
                self.call_timeout,
                "unexport",
                connection.unexport(path, *kind),
            )
            .await
            {
                tracing::warn!(path = %path, error = %e, "Failed to unexport during rollback");
            }
        }
        if let Some(name) = exports.name {
            if let Err(e) =
                bounded(self.call_timeout, "ReleaseName", connection.release_name(&name)).await
            {
                tracing::warn!(service = %name, error = %e, "Failed to release name during rollback");
            }
        }
    }

    /// Read-only items published on the device's own service.
    fn service_items(&self) -> Vec<(String, SettingValue)> {
        let identity = &self.identity;
        let layout = &self.layout;

        vec![
            ("/DeviceInstance".to_string(), identity.device_instance.into()),
            ("/ProductId".to_string(), identity.product_id.into()),
            ("/ProductName".to_string(), identity.product_name.as_str().into()),
            ("/CustomName".to_string(), identity.custom_name.as_str().into()),
            ("/Mgmt/ProcessName".to_string(), layout.process_name.as_str().into()),
            ("/Mgmt/ProcessVersion".to_string(), layout.process_version.as_str().into()),
            ("/Mgmt/Connection".to_string(), layout.connection.as_str().into()),
            ("/Connected".to_string(), 1.into()),
        ]
    }
}

/// What has been exported so far during one provisioning attempt.
#[derive(Debug, Default)]
struct Exports {
    name: Option<String>,
    objects: Vec<(String, ObjectKind)>,
}

/// The exported device on one connection generation.
///
/// Value updates take `&mut self`, so there is only ever one writer.
#[derive(Debug)]
pub struct DeviceHandle<B> {
    connection: B,
    state: Arc<DeviceState>,
    object_path: String,
    generation: u64,
    call_timeout: Duration,
}

impl<B: BusConnection> DeviceHandle<B> {
    /// Store `value` and emit one change notification carrying it.
    pub async fn set_value(&mut self, value: f64) -> Result<()> {
        self.state.store(value);
        let text = self.state.text();

        bounded(
            self.call_timeout,
            "PropertiesChanged",
            self.connection.emit_changed(&self.object_path, value, &text),
        )
        .await
        .map_err(|e| BridgeError::Push {
            path: self.object_path.clone(),
            message: e.to_string(),
        })
    }

    /// The current value.
    pub fn value(&self) -> f64 {
        self.state.value()
    }

    /// The current value rendered with one decimal and the unit.
    pub fn get_text(&self) -> String {
        self.state.text()
    }

    /// The shared state backing the exported object.
    pub fn state(&self) -> &Arc<DeviceState> {
        &self.state
    }

    /// Path of the exported value object.
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    /// Connection generation this device was exported on.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn protocol_error(path: &str, err: BusError) -> BridgeError {
    match err {
        BusError::Protocol { path, message } => BridgeError::BusProtocol { path, message },
        other => BridgeError::BusProtocol {
            path: path.to_string(),
            message: other.to_string(),
        },
    }
}

/// Run a bus call with an upper time bound.
async fn bounded<T, F>(timeout: Duration, operation: &str, call: F) -> std::result::Result<T, BusError>
where
    F: Future<Output = std::result::Result<T, BusError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| BusError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
}
