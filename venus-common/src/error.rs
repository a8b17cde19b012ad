use thiserror::Error;

/// Common error type for Venus bridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bus path: {0}")]
    Path(String),

    #[error("Connection timed out after {0} ms")]
    Timeout(u64),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
