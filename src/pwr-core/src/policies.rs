// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Retry policies for the boot path and the restart supervisor.

use std::time::Duration;

use crate::error::ControllerError;

/// Policy for retrying failed operations.
pub trait RetryPolicy: Send + Sync {
    /// Determine if the operation should be retried.
    fn should_retry(&self, attempt: u32, error: &ControllerError) -> bool;

    /// Get the delay before the next retry attempt.
    fn delay(&self, attempt: u32) -> Duration;

    /// Maximum number of attempts, `None` for no limit.
    fn max_attempts(&self) -> Option<u32>;
}

/// Exponential backoff retry policy.
///
/// Delays double with each attempt up to `max_delay`. Without an attempt
/// limit the policy keeps retrying transient errors forever.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_attempts: Option<u32>,
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    /// Create a policy that gives up after `max_attempts`.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            base_delay,
            max_delay,
        }
    }

    /// Create a policy that never gives up on transient errors.
    pub fn unbounded(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: None,
            base_delay,
            max_delay,
        }
    }

    /// Defaults used for node configuration retrieval.
    pub fn default_fetch() -> Self {
        Self::unbounded(Duration::from_millis(500), Duration::from_secs(30))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::default_fetch()
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt: u32, error: &ControllerError) -> bool {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return false;
            }
        }
        error.is_transient()
    }

    fn delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(multiplier);
        delay.min(self.max_delay)
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

/// Fixed delay retry policy.
///
/// Used between controller reboots; any fatal error qualifies.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, _attempt: u32, error: &ControllerError) -> bool {
        error.is_fatal()
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> Option<u32> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::PinId;

    #[test]
    fn test_exponential_backoff_delays() {
        let policy = ExponentialBackoff::new(5, Duration::from_millis(100), Duration::from_secs(1));

        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        // Should cap at max_delay
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(policy.delay(40), Duration::from_secs(1));
    }

    #[test]
    fn test_bounded_backoff_stops() {
        let policy = ExponentialBackoff::new(3, Duration::from_millis(100), Duration::from_secs(1));
        let transient = ControllerError::ConfigFetch("refused".into());

        assert!(policy.should_retry(2, &transient));
        assert!(!policy.should_retry(3, &transient));
    }

    #[test]
    fn test_unbounded_backoff_retries_only_transient() {
        let policy = ExponentialBackoff::unbounded(Duration::from_millis(10), Duration::from_secs(5));
        let transient = ControllerError::ConfigFetch("503".into());
        let fatal = ControllerError::UnknownPin(PinId(1));

        assert_eq!(policy.max_attempts(), None);
        assert!(policy.should_retry(10_000, &transient));
        assert!(!policy.should_retry(0, &fatal));
    }

    #[test]
    fn test_fixed_delay_retries_fatal() {
        let policy = FixedDelay::new(Duration::from_millis(750));
        let fatal = ControllerError::Transport("connection reset".into());
        let publish = ControllerError::Publish {
            queue: "Server".into(),
            reason: "nack".into(),
        };

        assert_eq!(policy.delay(7), Duration::from_millis(750));
        assert!(policy.should_retry(100, &fatal));
        assert!(!policy.should_retry(0, &publish));
    }
}
