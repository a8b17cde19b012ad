//! In-memory bus for testing.
//!
//! [`MockBus`] implements [`BusConnector`] without a D-Bus daemon. It keeps a
//! settings tree, claimed names, exported objects and every emitted change
//! notification, and can inject failures. [`MockBus::restart`] simulates the
//! bus daemon going away: everything owned is dropped and connections opened
//! before the restart fail from then on. Dropping a connection releases the
//! names and objects it owns, as the bus daemon does.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bus::{BusConnection, BusConnector, BusError, ObjectKind, SettingValue};
use crate::device::DeviceState;

/// A change notification recorded by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Object path the notification was emitted for.
    pub path: String,
    /// Value carried by the notification.
    pub value: f64,
    /// Text carried by the notification.
    pub text: String,
}

#[derive(Debug, Clone)]
enum MockObject {
    Value(Arc<DeviceState>),
    Constant(SettingValue),
}

impl MockObject {
    fn kind(&self) -> ObjectKind {
        match self {
            MockObject::Value(_) => ObjectKind::Value,
            MockObject::Constant(_) => ObjectKind::Constant,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    epoch: u64,
    connects: u64,
    settings: BTreeMap<String, SettingValue>,
    created: Vec<String>,
    names: BTreeMap<String, u64>,
    objects: BTreeMap<String, (u64, MockObject)>,
    notifications: Vec<Notification>,
    operations: Vec<String>,
    failing_connects: u32,
    failing_emits: u32,
    failing_reads: HashSet<String>,
    failing_creates: HashSet<String>,
    hang_reads: bool,
}

/// Shared handle to an in-memory bus.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    /// Create an empty bus with no settings.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Put a setting in place before the test runs.
    pub fn preload_setting(&self, path: &str, value: impl Into<SettingValue>) {
        self.lock().settings.insert(path.to_string(), value.into());
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_connects(&self, n: u32) {
        self.lock().failing_connects = n;
    }

    /// Make the next `n` change notifications fail.
    pub fn fail_emits(&self, n: u32) {
        self.lock().failing_emits = n;
    }

    /// Make reads of `path` fail with a protocol error.
    pub fn fail_read(&self, path: &str) {
        self.lock().failing_reads.insert(path.to_string());
    }

    /// Make creation of `path` fail with a protocol error.
    pub fn fail_create(&self, path: &str) {
        self.lock().failing_creates.insert(path.to_string());
    }

    /// Make every settings read hang forever.
    pub fn hang_reads(&self) {
        self.lock().hang_reads = true;
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_connects = 0;
        state.failing_emits = 0;
        state.failing_reads.clear();
        state.failing_creates.clear();
        state.hang_reads = false;
    }

    /// Simulate a bus daemon restart.
    ///
    /// Names and objects are dropped; settings survive, as they are persisted
    /// by the settings service.
    pub fn restart(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.names.clear();
        state.objects.clear();
        state.operations.push("restart".to_string());
    }

    /// Current value of a setting.
    pub fn setting(&self, path: &str) -> Option<SettingValue> {
        self.lock().settings.get(path).cloned()
    }

    /// Settings created so far, in creation order.
    pub fn created_settings(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    /// Number of writes made to the settings tree.
    pub fn write_count(&self) -> usize {
        self.lock().created.len()
    }

    /// Number of successful connections opened.
    pub fn connect_count(&self) -> u64 {
        self.lock().connects
    }

    /// Whether a name is currently owned.
    pub fn owns_name(&self, name: &str) -> bool {
        self.lock().names.contains_key(name)
    }

    /// Whether an object is currently exported at `path`.
    pub fn is_exported(&self, path: &str) -> bool {
        self.lock().objects.contains_key(path)
    }

    /// Paths of every exported object.
    pub fn exported_paths(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Value a bus consumer would read from the object at `path`.
    pub fn read_value(&self, path: &str) -> Option<SettingValue> {
        match &self.lock().objects.get(path)?.1 {
            MockObject::Value(state) => Some(SettingValue::Float(state.value())),
            MockObject::Constant(value) => Some(value.clone()),
        }
    }

    /// Text a bus consumer would read from the object at `path`.
    pub fn read_text(&self, path: &str) -> Option<String> {
        match &self.lock().objects.get(path)?.1 {
            MockObject::Value(state) => Some(state.text()),
            MockObject::Constant(value) => Some(value.to_string()),
        }
    }

    /// Every change notification emitted so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    /// Log of every bus operation, e.g. `read /Settings/X` or `export /X`.
    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }
}

impl BusConnector for MockBus {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, BusError> {
        let mut state = self.lock();
        state.operations.push("connect".to_string());
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(BusError::Unavailable("connection refused".to_string()));
        }
        state.connects += 1;

        Ok(MockConnection {
            bus: self.clone(),
            epoch: state.epoch,
            id: state.connects,
        })
    }
}

/// A connection to a [`MockBus`].
#[derive(Debug)]
pub struct MockConnection {
    bus: MockBus,
    epoch: u64,
    id: u64,
}

impl MockConnection {
    /// Lock the bus, failing if it restarted since this connection was opened.
    fn live(&self, operation: String) -> Result<MutexGuard<'_, MockState>, BusError> {
        let mut state = self.bus.lock();
        if state.epoch != self.epoch {
            return Err(BusError::Unavailable("connection closed".to_string()));
        }
        state.operations.push(operation);
        Ok(state)
    }
}

impl BusConnection for MockConnection {
    async fn read_setting(&self, path: &str) -> Result<SettingValue, BusError> {
        {
            let state = self.live(format!("read {}", path))?;
            if state.failing_reads.contains(path) {
                return Err(BusError::protocol(path, "injected read failure"));
            }
            if !state.hang_reads {
                return state
                    .settings
                    .get(path)
                    .cloned()
                    .ok_or_else(|| BusError::NotFound {
                        path: path.to_string(),
                    });
            }
        }

        std::future::pending().await
    }

    async fn create_setting(&self, path: &str, default: &SettingValue) -> Result<(), BusError> {
        let mut state = self.live(format!("create {}", path))?;
        if state.failing_creates.contains(path) {
            return Err(BusError::protocol(path, "injected create failure"));
        }
        state.settings.insert(path.to_string(), default.clone());
        state.created.push(path.to_string());
        Ok(())
    }

    async fn request_name(&self, name: &str) -> Result<(), BusError> {
        let mut state = self.live(format!("request {}", name))?;
        if state.names.contains_key(name) {
            return Err(BusError::protocol(name, "name already owned"));
        }
        state.names.insert(name.to_string(), self.id);
        Ok(())
    }

    async fn release_name(&self, name: &str) -> Result<(), BusError> {
        let mut state = self.live(format!("release {}", name))?;
        state.names.remove(name);
        Ok(())
    }

    async fn export_value(&self, path: &str, device: Arc<DeviceState>) -> Result<(), BusError> {
        let mut state = self.live(format!("export {}", path))?;
        if state.objects.contains_key(path) {
            return Err(BusError::protocol(path, "object already exported"));
        }
        state
            .objects
            .insert(path.to_string(), (self.id, MockObject::Value(device)));
        Ok(())
    }

    async fn export_constant(&self, path: &str, value: SettingValue) -> Result<(), BusError> {
        let mut state = self.live(format!("constant {}", path))?;
        if state.objects.contains_key(path) {
            return Err(BusError::protocol(path, "object already exported"));
        }
        state
            .objects
            .insert(path.to_string(), (self.id, MockObject::Constant(value)));
        Ok(())
    }

    async fn unexport(&self, path: &str, kind: ObjectKind) -> Result<(), BusError> {
        let mut state = self.live(format!("unexport {}", path))?;
        match state.objects.get(path) {
            Some((_, object)) if object.kind() != kind => Err(BusError::protocol(
                path,
                format!("no {:?} object exported here", kind),
            )),
            Some(_) => {
                state.objects.remove(path);
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn emit_changed(&self, path: &str, value: f64, text: &str) -> Result<(), BusError> {
        let mut state = self.live(format!("emit {}", path))?;
        if state.failing_emits > 0 {
            state.failing_emits -= 1;
            return Err(BusError::Unavailable("connection reset by peer".to_string()));
        }
        state.notifications.push(Notification {
            path: path.to_string(),
            value,
            text: text.to_string(),
        });
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        let mut state = self.bus.lock();
        if state.epoch == self.epoch {
            let id = self.id;
            state.names.retain(|_, owner| *owner != id);
            state.objects.retain(|_, (owner, _)| *owner != id);
        }
    }
}
