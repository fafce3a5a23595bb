//! Reconnection policies.

use std::time::Duration;

use ezpass_config::{ReconnectConfig, ReconnectPolicyKind};

/// How the channel recovers from a lost or failed connection.
///
/// Exactly one policy is active per channel; the two are never mixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Reconnect only when the next operation needs the channel. No cap.
    #[default]
    Lazy,
    /// Reconnect eagerly after a fixed delay, at most `max_attempts`
    /// consecutive times; afterwards operations fail fast.
    Bounded { max_attempts: u32, delay: Duration },
}

impl ReconnectPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        match config.policy {
            ReconnectPolicyKind::Lazy => ReconnectPolicy::Lazy,
            ReconnectPolicyKind::Bounded => ReconnectPolicy::Bounded {
                max_attempts: config.max_attempts,
                delay: Duration::from_millis(config.delay_ms),
            },
        }
    }

    /// Delay before the next automatic attempt after `failed` consecutive
    /// connect failures, or `None` when no automatic attempt is made.
    pub fn next_attempt(&self, failed: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::Lazy => None,
            ReconnectPolicy::Bounded {
                max_attempts,
                delay,
            } => (failed < *max_attempts).then_some(*delay),
        }
    }

    /// Delay before reconnecting after an open connection drops.
    pub fn reconnect_after_drop(&self) -> Option<Duration> {
        self.next_attempt(0)
    }
}
