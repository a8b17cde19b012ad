//! The sample-source capability polled by the supervisor.

use std::future::Future;

use thiserror::Error;

/// Errors produced while obtaining a sample.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The sensor could not be located.
    #[error("sensor not found: {0}")]
    NotFound(String),

    /// The sensor answered with data that is not a usable reading.
    #[error("invalid reading: {0}")]
    Invalid(String),

    /// Reading the sensor failed.
    #[error("sensor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A zero-argument source of scalar readings.
///
/// Implementations are injected into the [`Supervisor`](crate::Supervisor)
/// and polled from its task only.
pub trait SampleSource: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Obtain one reading.
    fn sample(&mut self) -> impl Future<Output = Result<f64, SampleError>> + Send;
}

/// A [`SampleSource`] backed by a closure.
///
/// Created with [`source_fn`].
pub struct SourceFn<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a [`SampleSource`].
///
/// # Example
///
/// ```
/// use venus_bridge_framework::{SampleSource, source_fn};
///
/// let mut source = source_fn("constant", || Ok(22.5));
/// assert_eq!(source.name(), "constant");
/// ```
pub fn source_fn<F>(name: impl Into<String>, f: F) -> SourceFn<F>
where
    F: FnMut() -> Result<f64, SampleError> + Send + 'static,
{
    SourceFn {
        name: name.into(),
        f,
    }
}

impl<F> SampleSource for SourceFn<F>
where
    F: FnMut() -> Result<f64, SampleError> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn sample(&mut self) -> Result<f64, SampleError> {
        (self.f)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_source_fn_yields_closure_results() {
        let mut readings = vec![Ok(1.5), Err(SampleError::Invalid("CRC".to_string()))];
        let mut source = source_fn("scripted", move || readings.remove(0));

        assert_eq!(source.sample().await.unwrap(), 1.5);
        assert!(matches!(
            source.sample().await,
            Err(SampleError::Invalid(msg)) if msg == "CRC"
        ));
    }
}
