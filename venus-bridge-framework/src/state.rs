//! Connection state of the supervised device.

use serde::{Deserialize, Serialize};

/// Where the supervisor is in its lifecycle.
///
/// ```text
/// Disconnected -> Connecting -> Registered <-> Degraded
///       ^             |  ^          |             |
///       |             +--+          |             |
///       +---------------------------+-------------+
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No bus connection.
    #[default]
    Disconnected,
    /// Connecting and provisioning.
    Connecting,
    /// Exported and publishing fresh values.
    Registered,
    /// Exported, but the last sample failed; the previous value stays published.
    Degraded,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connecting | Registered) => true,
            (Registered | Degraded, Registered | Degraded) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Registered => write!(f, "registered"),
            ConnectionState::Degraded => write!(f, "degraded"),
        }
    }
}
