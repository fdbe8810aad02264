// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Wall-clock helpers. Deadlines that must survive a restart are stored as
//! Unix epoch milliseconds, never as monotonic instants.

use std::time::Duration;

use chrono::Utc;

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute deadline `delay` after `now_ms`.
pub fn deadline_after(now_ms: i64, delay: Duration) -> i64 {
    let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(delay_ms)
}

/// Time left until `deadline_ms`, or zero when it already passed.
pub fn remaining_until(deadline_ms: i64, now_ms: i64) -> Duration {
    let left = deadline_ms.saturating_sub(now_ms);
    Duration::from_millis(u64::try_from(left).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_after() {
        assert_eq!(deadline_after(1_000, Duration::from_millis(5_000)), 6_000);
        assert_eq!(deadline_after(i64::MAX - 1, Duration::from_secs(1)), i64::MAX);
    }

    #[test]
    fn test_remaining_until_past_deadline_is_zero() {
        assert_eq!(remaining_until(1_000, 4_000), Duration::ZERO);
        assert_eq!(remaining_until(4_000, 1_000), Duration::from_millis(3_000));
    }

    #[test]
    fn test_now_is_after_2020() {
        assert!(now_epoch_millis() > 1_577_836_800_000);
    }
}
