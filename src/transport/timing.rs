//! Reconnect timing.
//!
//! What the session does after the relay drops the stream is an explicit
//! policy rather than a fixed behavior.

use std::time::Duration;

use crate::core::{DEFAULT_RECONNECT_INTERVAL_MAX, DEFAULT_RECONNECT_INTERVAL_MIN};

/// Exponential backoff: `initial * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: DEFAULT_RECONNECT_INTERVAL_MIN,
            max: DEFAULT_RECONNECT_INTERVAL_MAX,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        // Clamp the shift so the multiplier cannot overflow.
        let factor = 1u32 << attempt.min(31);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Behavior after the relay closes the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Go to `Disconnected` and let the caller decide.
    Never,
    /// Retry until reconnected or `disconnect` is called, with attempts at
    /// least `min_interval` apart.
    Forever {
        /// Minimum spacing between attempts.
        min_interval: Duration,
    },
    /// Retry up to `attempts` times with exponential backoff, then give up.
    UpTo {
        /// Maximum number of attempts.
        attempts: u32,
        /// Spacing between attempts.
        backoff: Backoff,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Forever {
            min_interval: DEFAULT_RECONNECT_INTERVAL_MIN,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based), or `None`
    /// once the policy gives up.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Never => None,
            Self::Forever { min_interval } => Some(min_interval),
            Self::UpTo { attempts, backoff } => (attempt < attempts).then(|| backoff.delay(attempt)),
        }
    }

    /// Whether the policy ever reconnects.
    pub fn reconnects(&self) -> bool {
        self.delay(0).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let backoff = Backoff {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(1000),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_millis(1000));
        assert_eq!(backoff.delay(200), Duration::from_millis(1000));
    }

    #[test]
    fn test_never_gives_up_immediately() {
        assert_eq!(ReconnectPolicy::Never.delay(0), None);
        assert!(!ReconnectPolicy::Never.reconnects());
    }

    #[test]
    fn test_forever_uses_min_interval() {
        let policy = ReconnectPolicy::Forever {
            min_interval: Duration::from_millis(250),
        };
        assert_eq!(policy.delay(0), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay(10_000), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_up_to_stops_after_attempts() {
        let policy = ReconnectPolicy::UpTo {
            attempts: 2,
            backoff: Backoff {
                initial: Duration::from_millis(10),
                max: Duration::from_secs(1),
            },
        };

        assert_eq!(policy.delay(0), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay(1), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay(2), None);
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(
            ReconnectPolicy::default(),
            ReconnectPolicy::Forever {
                min_interval: Duration::from_millis(100)
            }
        );
    }
}
