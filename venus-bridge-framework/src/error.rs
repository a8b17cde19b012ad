//! Error types for the bridge framework.

use thiserror::Error;

use crate::bus::BusError;
use crate::source::SampleError;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The bus could not be reached, or registration on it failed.
    #[error("D-Bus unavailable: {0}")]
    BusUnavailable(String),

    /// The bus answered, but not the way the protocol requires.
    #[error("D-Bus protocol error at {path}: {message}")]
    BusProtocol { path: String, message: String },

    /// The sample source failed or produced an unusable reading.
    #[error("Sampling failed: {0}")]
    Sampling(#[from] SampleError),

    /// The bus rejected a value update.
    #[error("Failed to push value to {path}: {message}")]
    Push { path: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a failure originated, which decides how the supervisor recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDomain {
    /// The sample source failed; the bus registration is still good.
    Sampling,
    /// The bus connection or registration is gone.
    Bus,
    /// Anything else. Handled like [`FailureDomain::Bus`].
    Unexpected,
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a bus-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BusUnavailable(msg.into())
    }

    /// Classify this error for the supervisor's recovery policy.
    pub fn domain(&self) -> FailureDomain {
        match self {
            Self::Sampling(_) => FailureDomain::Sampling,
            Self::BusUnavailable(_) | Self::BusProtocol { .. } | Self::Push { .. } => {
                FailureDomain::Bus
            }
            _ => FailureDomain::Unexpected,
        }
    }
}

impl From<BusError> for BridgeError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::NotFound { path } => Self::BusProtocol {
                path,
                message: "does not exist".to_string(),
            },
            BusError::Protocol { path, message } => Self::BusProtocol { path, message },
            BusError::Unavailable(message) => Self::BusUnavailable(message),
            err @ BusError::Timeout { .. } => Self::BusUnavailable(err.to_string()),
        }
    }
}

impl From<venus_common::Error> for BridgeError {
    fn from(err: venus_common::Error) -> Self {
        match err {
            venus_common::Error::Config(msg) => Self::Config(msg),
            venus_common::Error::Io(e) => Self::Io(e),
            other => Self::BusUnavailable(other.to_string()),
        }
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}
