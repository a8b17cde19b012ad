//! The supervisor loop.
//!
//! Drives a [`Registrar`] and a [`SampleSource`] through the
//! [`ConnectionState`] machine:
//!
//! - `Disconnected`: move to `Connecting` right away.
//! - `Connecting`: connect and export. Success goes to `Registered`; failure
//!   stays in `Connecting` and waits the reconnect delay.
//! - `Registered` / `Degraded`: sample and push. A sampling failure goes to
//!   `Degraded` and waits the sampling backoff, leaving the published value
//!   untouched. A push failure, or any error not recognised as a sampling
//!   failure, drops the device and goes to `Disconnected` after the reconnect
//!   delay. A successful push goes to `Registered` and waits the sample interval.
//!
//! The loop never ends on its own.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;

use crate::bus::BusConnector;
use crate::error::{BridgeError, FailureDomain};
use crate::policy::RetryPolicy;
use crate::registrar::{DeviceHandle, Registrar};
use crate::source::{SampleError, SampleSource};
use crate::state::ConnectionState;

/// Counters kept by the supervisor.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SupervisorStats {
    /// Values pushed to the bus.
    pub samples_published: u64,
    /// Failed samples.
    pub sampling_failures: u64,
    /// Failed registration attempts.
    pub registration_failures: u64,
    /// Times an exported device was dropped for a reconnect.
    pub connection_losses: u64,
    /// Last value pushed to the bus.
    pub last_value: Option<f64>,
    /// When the last value was pushed.
    pub last_sample_at: Option<DateTime<Utc>>,
}

/// Owns the device lifecycle for the whole process.
pub struct Supervisor<C: BusConnector, S: SampleSource> {
    registrar: Registrar<C>,
    source: S,
    policy: RetryPolicy,
    state: ConnectionState,
    device: Option<DeviceHandle<C::Connection>>,
    stats: SupervisorStats,
}

impl<C: BusConnector, S: SampleSource> Supervisor<C, S> {
    /// Create a supervisor in the `Disconnected` state.
    pub fn new(registrar: Registrar<C>, source: S, policy: RetryPolicy) -> Self {
        Self {
            registrar,
            source,
            policy,
            state: ConnectionState::Disconnected,
            device: None,
            stats: SupervisorStats::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The exported device, if registered.
    pub fn device(&self) -> Option<&DeviceHandle<C::Connection>> {
        self.device.as_ref()
    }

    /// Counters collected so far.
    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    /// The retry policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run forever.
    pub async fn run(mut self) {
        tracing::info!(
            source = %self.source.name(),
            service = %self.registrar.layout().service_name,
            sample_interval_secs = self.policy.sample_interval.as_secs(),
            "Supervisor started"
        );

        loop {
            let delay = self.tick().await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Run one [`step`](Self::step), treating a panic as a connection loss.
    pub async fn tick(&mut self) -> Duration {
        let outcome = AssertUnwindSafe(self.step()).catch_unwind().await;

        match outcome {
            Ok(delay) => delay,
            Err(panic) => {
                tracing::error!(
                    state = %self.state,
                    panic = %panic_message(panic.as_ref()),
                    delay_secs = self.policy.reconnect_delay.as_secs(),
                    "Supervisor step panicked, reconnecting"
                );
                self.drop_device();
                self.policy.reconnect_delay
            }
        }
    }

    /// Perform one transition and return how long to wait before the next.
    pub async fn step(&mut self) -> Duration {
        match self.state {
            ConnectionState::Disconnected => {
                self.transition(ConnectionState::Connecting);
                Duration::ZERO
            }
            ConnectionState::Connecting => self.register().await,
            ConnectionState::Registered | ConnectionState::Degraded => self.sample().await,
        }
    }

    async fn register(&mut self) -> Duration {
        let registrar = &self.registrar;
        let start = self
            .stats
            .last_value
            .unwrap_or(registrar.layout().initial_value);
        let result = async {
            let session = registrar.connect().await?;
            registrar.export_device_at(session, start).await
        }
        .await;

        match result {
            Ok(device) => {
                tracing::info!(
                    generation = device.generation(),
                    path = %device.object_path(),
                    text = %device.get_text(),
                    "Device registered"
                );
                self.device = Some(device);
                self.transition(ConnectionState::Registered);
                Duration::ZERO
            }
            Err(e) => {
                self.stats.registration_failures += 1;
                tracing::error!(
                    state = %self.state,
                    error = %e,
                    delay_secs = self.policy.reconnect_delay.as_secs(),
                    "Registration failed, retrying"
                );
                self.policy.reconnect_delay
            }
        }
    }

    async fn sample(&mut self) -> Duration {
        let reading = match self.source.sample().await {
            Ok(value) if value.is_finite() => value,
            Ok(value) => {
                return self.fail(BridgeError::Sampling(SampleError::Invalid(format!(
                    "non-finite reading {}",
                    value
                ))));
            }
            Err(e) => return self.fail(BridgeError::Sampling(e)),
        };

        let Some(device) = self.device.as_mut() else {
            return self.fail(BridgeError::unavailable("no exported device"));
        };

        if let Err(e) = device.set_value(reading).await {
            return self.fail(e);
        }

        self.stats.samples_published += 1;
        self.stats.last_value = Some(reading);
        self.stats.last_sample_at = Some(Utc::now());
        if self.state == ConnectionState::Degraded {
            tracing::info!(value = reading, "Sampling recovered");
        }
        self.transition(ConnectionState::Registered);
        tracing::debug!(
            value = reading,
            published = self.stats.samples_published,
            "Value published"
        );

        self.policy.sample_interval
    }

    fn fail(&mut self, error: BridgeError) -> Duration {
        match error.domain() {
            FailureDomain::Sampling => {
                self.stats.sampling_failures += 1;
                tracing::error!(
                    state = %self.state,
                    error = %error,
                    delay_secs = self.policy.sampling_backoff.as_secs(),
                    "Sampling failed, keeping last value"
                );
                self.transition(ConnectionState::Degraded);
                self.policy.sampling_backoff
            }
            FailureDomain::Bus => {
                tracing::error!(
                    state = %self.state,
                    error = %error,
                    delay_secs = self.policy.reconnect_delay.as_secs(),
                    "Bus failure, reconnecting"
                );
                self.drop_device();
                self.policy.reconnect_delay
            }
            FailureDomain::Unexpected => {
                tracing::error!(
                    state = %self.state,
                    error = %error,
                    delay_secs = self.policy.reconnect_delay.as_secs(),
                    "Unexpected error, treating as connection loss"
                );
                self.drop_device();
                self.policy.reconnect_delay
            }
        }
    }

    fn drop_device(&mut self) {
        if self.device.take().is_some() {
            self.stats.connection_losses += 1;
        }
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "Unexpected state transition");
        }
        tracing::info!(from = %self.state, to = %next, "State changed");
        self.state = next;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
