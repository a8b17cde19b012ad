//! Retry and pacing policy for the supervisor loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed delays applied by the supervisor after each kind of outcome.
///
/// There is no retry cap: the supervisor keeps trying for as long as the
/// process lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay between successful samples.
    pub sample_interval: Duration,
    /// Delay after a failed sample, before sampling again on the same connection.
    pub sampling_backoff: Duration,
    /// Delay after a bus-level failure, before reconnecting.
    pub reconnect_delay: Duration,
}

impl Default for RetryPolicy {
    /// Returns a policy with:
    /// - `sample_interval = 5s`;
    /// - `sampling_backoff = 60s`;
    /// - `reconnect_delay = 60s`.
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
            sampling_backoff: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from whole seconds.
    pub fn from_secs(sample_interval: u64, sampling_backoff: u64, reconnect_delay: u64) -> Self {
        Self {
            sample_interval: Duration::from_secs(sample_interval),
            sampling_backoff: Duration::from_secs(sampling_backoff),
            reconnect_delay: Duration::from_secs(reconnect_delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.sample_interval, Duration::from_secs(5));
        assert_eq!(policy.sampling_backoff, Duration::from_secs(60));
        assert_eq!(policy.reconnect_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_from_secs() {
        assert_eq!(RetryPolicy::from_secs(5, 60, 60), RetryPolicy::default());
        assert_eq!(
            RetryPolicy::from_secs(1, 2, 3).reconnect_delay,
            Duration::from_secs(3)
        );
    }
}
