//! # Host retry backoff.
//!
//! [`RetryBackoff`] turns a request's [`BackoffConfig`] (or the platform
//! default, exponential from `default_backoff`) into the delay before each
//! retry. The base delay is derived from the attempt number alone, capped at
//! `max_backoff`, then jittered; jitter output never feeds the next attempt.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskbridge::{BackoffConfig, BackoffKind, JitterPolicy, PlatformLimits, RetryBackoff};
//!
//! let limits = PlatformLimits::android();
//! let backoff = RetryBackoff::new(
//!     Some(BackoffConfig::new(BackoffKind::Linear, Duration::from_secs(20))),
//!     &limits,
//!     JitterPolicy::None,
//! );
//! assert_eq!(backoff.next(1), Duration::from_secs(20));
//! assert_eq!(backoff.next(3), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::config::PlatformLimits;
use crate::platform::local::jitter::JitterPolicy;
use crate::request::{BackoffConfig, BackoffKind};

/// Delay schedule for host retries of one task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryBackoff {
    pub config: BackoffConfig,
    pub max: Duration,
    pub jitter: JitterPolicy,
}

impl RetryBackoff {
    pub fn new(
        requested: Option<BackoffConfig>,
        limits: &PlatformLimits,
        jitter: JitterPolicy,
    ) -> Self {
        let config = requested
            .unwrap_or(BackoffConfig::new(
                BackoffKind::Exponential,
                limits.default_backoff,
            ))
            .clamped(limits);
        Self {
            config,
            max: limits.max_backoff,
            jitter,
        }
    }

    /// Delay before retry number `attempt` (1 = after the first failed run).
    pub fn next(&self, attempt: u32) -> Duration {
        let base = self.config.delay_for(attempt, self.max);
        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.config.delay.min(self.max), base, self.max)
            }
            other => other.apply(base),
        }
    }
}
