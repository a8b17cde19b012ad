//! Venus Bridge Framework
//!
//! Common abstractions for bridges that publish a polled device value on the
//! Victron Venus D-Bus.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`Registrar`] for provisioning settings and exporting the device object
//! - [`Supervisor`] for the connect / sample / push state machine
//! - [`BridgeRunner`] for managing bridge lifecycle (logging, tasks, Ctrl+C)
//! - [`ZbusConnector`] for the real bus and [`mock::MockBus`] for tests
//!
//! # Example
//!
//! ```ignore
//! use venus_bridge_framework::{
//!     BridgeArgs, BridgeConfig, BridgeRunner, Registrar, RetryPolicy, Supervisor, ZbusConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
//!
//!     let connector = ZbusConnector::new(runner.config().dbus().clone());
//!     let registrar = Registrar::new(connector, identity, layout);
//!     runner.spawn_supervisor(Supervisor::new(registrar, my_source, RetryPolicy::default()));
//!
//!     // Run until Ctrl+C
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
pub mod bus;
mod config;
pub mod dbus;
pub mod device;
mod error;
pub mod mock;
mod policy;
pub mod registrar;
mod runner;
mod source;
mod state;
mod supervisor;

pub use args::BridgeArgs;
pub use bus::{BusConnection, BusConnector, BusError, ObjectKind, SettingValue};
pub use config::BridgeConfig;
pub use dbus::ZbusConnector;
pub use device::DeviceState;
pub use error::{BridgeError, FailureDomain, Result};
pub use policy::RetryPolicy;
pub use registrar::{BusSession, DeviceHandle, DeviceIdentity, Provisioned, Registrar, ServiceLayout};
pub use runner::BridgeRunner;
pub use source::{SampleError, SampleSource, SourceFn, source_fn};
pub use state::ConnectionState;
pub use supervisor::{Supervisor, SupervisorStats};

// Re-export commonly used types from venus-common
pub use venus_common::{BusKind, DbusConfig, LogFormat, LoggingConfig};
