//! Venus D-Bus bridge for a temperature sensor.
//!
//! This bridge polls a temperature probe and publishes the reading on the
//! Venus D-Bus for the GX console and other consumers.

use anyhow::Result;
use venus_bridge_framework::{
    BridgeArgs, BridgeConfig, BridgeRunner, Registrar, SampleSource, Supervisor, ZbusConnector,
};

use venus_bridge_temperature::config::TemperatureBridgeConfig;
use venus_bridge_temperature::source::ConfiguredSource;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = BridgeArgs::parse_with_default("temperature.json5");

    // Load configuration using the framework's BridgeConfig trait
    let config =
        TemperatureBridgeConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    // Create the bridge runner
    let mut runner = BridgeRunner::new_with_args("temperature", config, Some(&args))
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .with_version(env!("CARGO_PKG_VERSION"));

    let config = runner.config();
    let connector = ZbusConnector::new(config.dbus.clone());
    let registrar = Registrar::new(
        connector,
        config.identity(),
        config.layout(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    )
    .with_call_timeout(config.call_timeout());
    let source = ConfiguredSource::from_config(&config.source);
    let policy = config.retry_policy();

    // Build status metadata
    let metadata = serde_json::json!({
        "service": config.service_name(),
        "object_path": config.device.object_path,
        "device_instance": config.device.device_instance,
        "source": source.name(),
        "timing": policy,
    });

    runner.spawn_supervisor(Supervisor::new(registrar, source, policy));

    // Run until Ctrl+C
    runner
        .run_with_metadata(Some(metadata))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}
