//! Integration tests for the registrar and supervisor against the in-memory bus.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use venus_bridge_framework::mock::MockBus;
use venus_bridge_framework::{
    BridgeError, ConnectionState, DeviceIdentity, Provisioned, Registrar, RetryPolicy,
    SampleError, ServiceLayout, SettingValue, Supervisor, source_fn,
};

const SERVICE: &str = "com.victronenergy.temperature.brass_monkey";
const ROOT: &str = "/Settings/Temperature/BrassMonkey";

fn identity() -> DeviceIdentity {
    DeviceIdentity {
        device_instance: 245,
        product_id: 0xB104,
        product_name: "Brass Monkey Fridge Monitor".to_string(),
        custom_name: "Brass Monkey Fridge Monitor".to_string(),
    }
}

fn layout() -> ServiceLayout {
    ServiceLayout {
        service_name: SERVICE.to_string(),
        object_path: ROOT.to_string(),
        unit: "°C".to_string(),
        initial_value: 25.0,
        process_name: "venus-bridge-temperature".to_string(),
        process_version: "0.1.0".to_string(),
        connection: "test".to_string(),
    }
}

fn registrar(bus: &MockBus) -> Registrar<MockBus> {
    Registrar::new(bus.clone(), identity(), layout())
}

/// A source whose next reading is set by the test.
fn controlled() -> (
    Arc<Mutex<Result<f64, String>>>,
    impl venus_bridge_framework::SampleSource,
) {
    let next = Arc::new(Mutex::new(Ok(22.5)));
    let shared = Arc::clone(&next);
    let source = source_fn("controlled", move || {
        shared
            .lock()
            .unwrap()
            .clone()
            .map_err(SampleError::Invalid)
    });
    (next, source)
}

#[tokio::test]
async fn test_fresh_bus_registration() {
    let bus = MockBus::new();
    let (_, source) = controlled();
    let mut supervisor = Supervisor::new(registrar(&bus), source, RetryPolicy::default());

    supervisor.step().await;
    supervisor.step().await;

    assert_eq!(supervisor.state(), ConnectionState::Registered);
    assert!(bus.owns_name(SERVICE));
    assert!(bus.is_exported(ROOT));
    assert_eq!(
        bus.setting(&format!("{}/DeviceInstance", ROOT)),
        Some(SettingValue::Int(245))
    );
    assert_eq!(
        bus.setting(&format!("{}/ProductId", ROOT)),
        Some(SettingValue::Int(0xB104))
    );
    assert_eq!(
        bus.setting(&format!("{}/ProductName", ROOT)),
        Some(SettingValue::from("Brass Monkey Fridge Monitor"))
    );
    assert_eq!(
        bus.setting(&format!("{}/CustomName", ROOT)),
        Some(SettingValue::from("Brass Monkey Fridge Monitor"))
    );
    assert_eq!(bus.read_value("/Connected"), Some(SettingValue::Int(1)));
    assert_eq!(
        bus.read_value("/Mgmt/ProcessName"),
        Some(SettingValue::from("venus-bridge-temperature"))
    );
}

#[tokio::test]
async fn test_sample_updates_value_and_text() {
    let bus = MockBus::new();
    let (_, source) = controlled();
    let mut supervisor = Supervisor::new(registrar(&bus), source, RetryPolicy::default());

    supervisor.step().await;
    supervisor.step().await;
    let delay = supervisor.step().await;

    assert_eq!(delay, Duration::from_secs(5));
    assert_eq!(supervisor.state(), ConnectionState::Registered);
    let device = supervisor.device().unwrap();
    assert_eq!(device.value(), 22.5);
    assert_eq!(device.get_text(), "22.5 °C");
    assert_eq!(bus.read_text(ROOT).as_deref(), Some("22.5 °C"));
}

#[tokio::test]
async fn test_sampling_failure_keeps_stale_value() {
    let bus = MockBus::new();
    let (next, source) = controlled();
    let mut supervisor = Supervisor::new(registrar(&bus), source, RetryPolicy::default());

    supervisor.step().await;
    supervisor.step().await;
    supervisor.step().await;

    *next.lock().unwrap() = Err("probe unplugged".to_string());
    for _ in 0..3 {
        assert_eq!(supervisor.step().await, Duration::from_secs(60));
        assert_eq!(supervisor.state(), ConnectionState::Degraded);
        assert_eq!(bus.read_value(ROOT), Some(SettingValue::Float(22.5)));
    }
    assert_eq!(bus.connect_count(), 1);

    *next.lock().unwrap() = Ok(3.0);
    assert_eq!(supervisor.step().await, Duration::from_secs(5));
    assert_eq!(supervisor.state(), ConnectionState::Registered);
    assert_eq!(bus.read_value(ROOT), Some(SettingValue::Float(3.0)));
}

#[tokio::test]
async fn test_push_failure_reconnects() {
    let bus = MockBus::new();
    let (_, source) = controlled();
    let mut supervisor = Supervisor::new(registrar(&bus), source, RetryPolicy::default());

    supervisor.step().await;
    supervisor.step().await;

    bus.restart();
    assert_eq!(supervisor.step().await, Duration::from_secs(60));
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);

    assert_eq!(supervisor.step().await, Duration::ZERO);
    assert_eq!(supervisor.state(), ConnectionState::Connecting);
    supervisor.step().await;
    assert_eq!(supervisor.state(), ConnectionState::Registered);
    assert_eq!(bus.connect_count(), 2);
    assert!(bus.owns_name(SERVICE));

    // Settings survive the restart, so nothing is created twice.
    assert_eq!(bus.write_count(), 5);
}

#[tokio::test]
async fn test_ensure_path_is_idempotent() {
    let bus = MockBus::new();
    let registrar = registrar(&bus);
    let session = registrar.connect().await.unwrap();
    let path = format!("{}/DeviceInstance", ROOT);

    let first = registrar
        .ensure_path(session.connection(), &path, &SettingValue::Int(245))
        .await
        .unwrap();
    let after_first = (bus.setting(&path), bus.write_count());
    let second = registrar
        .ensure_path(session.connection(), &path, &SettingValue::Int(245))
        .await
        .unwrap();

    assert_eq!(first, Provisioned::Created);
    assert_eq!(second, Provisioned::Existing);
    assert_eq!((bus.setting(&path), bus.write_count()), after_first);
}

#[tokio::test]
async fn test_text_follows_every_write() {
    let bus = MockBus::new();
    let registrar = registrar(&bus);
    let session = registrar.connect().await.unwrap();
    let mut device = registrar.export_device(session).await.unwrap();

    for (value, text) in [
        (22.5, "22.5 °C"),
        (-4.0, "-4.0 °C"),
        (0.04, "0.0 °C"),
        (3.96, "4.0 °C"),
        (100.0, "100.0 °C"),
    ] {
        device.set_value(value).await.unwrap();
        assert_eq!(device.get_text(), text);
    }
}

#[tokio::test]
async fn test_notification_per_write() {
    let bus = MockBus::new();
    let registrar = registrar(&bus);
    let session = registrar.connect().await.unwrap();
    let mut device = registrar.export_device(session).await.unwrap();

    let writes = [1.0, 1.0, 1.0, 2.0, 2.0, 1.0];
    for value in writes {
        device.set_value(value).await.unwrap();
    }

    let notifications = bus.notifications();
    assert_eq!(notifications.len(), writes.len());
    assert!(notifications.iter().all(|n| n.path == ROOT));
    assert_eq!(
        notifications.iter().map(|n| n.value).collect::<Vec<_>>(),
        writes.to_vec()
    );
}

#[tokio::test]
async fn test_no_partial_registration() {
    let bus = MockBus::new();
    bus.fail_create(&format!("{}/CustomName", ROOT));
    let registrar = registrar(&bus);

    let session = registrar.connect().await.unwrap();
    let err = registrar.export_device(session).await.unwrap_err();

    assert!(matches!(err, BridgeError::BusUnavailable(_)));
    assert!(bus.exported_paths().is_empty());
    assert!(!bus.owns_name(SERVICE));

    bus.clear_failures();
    let session = registrar.connect().await.unwrap();
    let device = registrar.export_device(session).await.unwrap();

    assert_eq!(device.value(), 25.0);
    assert!(bus.is_exported(ROOT));
    assert!(bus.owns_name(SERVICE));
    assert_eq!(
        bus.setting(&format!("{}/CustomName", ROOT)),
        Some(SettingValue::from("Brass Monkey Fridge Monitor"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_outage_recovery_timeline() {
    let bus = MockBus::new();
    bus.fail_connects(2);
    let (_, source) = controlled();
    let supervisor = Supervisor::new(registrar(&bus), source, RetryPolicy::default());

    let task = tokio::spawn(supervisor.run());

    // Connect attempts at 0s and 60s fail, 120s succeeds and samples.
    tokio::time::sleep(Duration::from_secs(119)).await;
    assert!(bus.notifications().is_empty());
    assert!(!bus.owns_name(SERVICE));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(bus.notifications().len(), 1);
    assert!(bus.owns_name(SERVICE));

    task.abort();
}
