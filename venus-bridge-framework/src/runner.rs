//! Bridge runner for lifecycle management.

use std::future::Future;

use tokio::signal;
use tokio::task::JoinHandle;

use venus_common::{LoggingConfig, init_tracing};

use crate::BridgeArgs;
use crate::bus::BusConnector;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::source::SampleSource;
use crate::supervisor::Supervisor;

/// Bridge runner that manages the lifecycle of a device bridge.
///
/// Handles:
/// - Logging initialization
/// - Task spawning and management
/// - Shutdown on Ctrl+C
///
/// Connecting to the bus is the supervisor's job, so a bus that is down at
/// startup does not stop the runner.
///
/// # Example
///
/// ```ignore
/// use venus_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
///     runner.spawn_supervisor(build_supervisor(runner.config()));
///
///     runner.run().await
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner and initialize logging from the config.
    pub fn new(name: impl Into<String>, config: C) -> Result<Self> {
        Self::new_with_args(name, config, None)
    }

    /// Create a new bridge runner with CLI args for log level override.
    pub fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        // Initialize logging with optional CLI override
        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(
            bridge = %name,
            version = %version,
            service = %config.service_name(),
            bus = %config.dbus().describe(),
            "Starting bridge"
        );

        Ok(Self {
            name,
            version,
            config,
            tasks: Vec::new(),
        })
    }

    /// Override the version reported in logs.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Spawn a supervisor loop.
    pub fn spawn_supervisor<B, S>(&mut self, supervisor: Supervisor<B, S>)
    where
        B: BusConnector,
        S: SampleSource,
    {
        self.spawn(supervisor.run());
    }

    /// Run the bridge until Ctrl+C is received.
    pub async fn run(self) -> Result<()> {
        self.run_with_metadata(None).await
    }

    /// Run the bridge, logging custom metadata once at startup.
    ///
    /// On Ctrl+C all tasks are aborted. Nothing is unexported explicitly:
    /// the bus releases the name when the connection closes.
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        tracing::info!(
            bridge = %self.name,
            version = %self.version,
            tasks = self.tasks.len(),
            metadata = %metadata.unwrap_or(serde_json::Value::Null),
            "Bridge running. Press Ctrl+C to stop."
        );

        // Wait for shutdown signal
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            // Without a signal handler the only way out is an external kill.
            std::future::pending::<()>().await;
        }

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}
