//! Integration tests for venus-common library.

use venus_common::path::{join, split_settings_path, validate_object_path};
use venus_common::{BaseConfig, BusKind, LogFormat, parse_config};

#[test]
fn test_settings_paths_built_from_registration_root() {
    let root = "/Settings/Temperature/BrassMonkey";

    for item in ["DeviceInstance", "ProductId", "ProductName", "CustomName"] {
        let path = join(root, item);
        validate_object_path(&path).expect("derived path must be valid");

        let (group, name) = split_settings_path(&path).expect("derived path must be a setting");
        assert_eq!(group, "Temperature/BrassMonkey");
        assert_eq!(name, item);
    }
}

#[test]
fn test_full_base_config() {
    let config: BaseConfig = parse_config(
        r#"{
            dbus: { bus: "system", address: "tcp:host=10.0.0.5,port=78", call_timeout_ms: 2000 },
            logging: { level: "warn", format: "json" },
        }"#,
    )
    .expect("config should parse");

    assert_eq!(config.dbus.bus, BusKind::System);
    assert_eq!(config.dbus.address.as_deref(), Some("tcp:host=10.0.0.5,port=78"));
    assert_eq!(config.dbus.call_timeout_ms, 2000);
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, LogFormat::Json);
}
