//! Bounded waiting against a monotonic clock.
//!
//! Connectivity attempts poll a condition until a deadline instead of
//! spinning forever.  The clock is a trait so the timeouts can be tested
//! with a fake one.

use crate::error::Error;

/// Shortest pause between reconnect attempts.
pub const BACKOFF_MIN_MS: u64 = 2_000;
/// Longest pause between reconnect attempts.
pub const BACKOFF_MAX_MS: u64 = 120_000;

/// Monotonic milliseconds plus a way to wait.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now_ms(&self) -> u64;
    async fn sleep_ms(&mut self, ms: u64);
}

/// An absolute point in time on some [`Clock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    at_ms: u64,
}

impl Deadline {
    pub fn after(now_ms: u64, timeout_ms: u64) -> Self {
        Self {
            at_ms: now_ms.saturating_add(timeout_ms),
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.at_ms
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.at_ms.saturating_sub(now_ms)
    }
}

/// Check `condition` every `interval_ms` until it holds or `timeout_ms`
/// has passed.  The condition is checked once more at the deadline.
pub async fn poll_until<C, F>(
    clock: &mut C,
    timeout_ms: u64,
    interval_ms: u64,
    mut condition: F,
) -> Result<(), Error>
where
    C: Clock,
    F: FnMut() -> bool,
{
    let deadline = Deadline::after(clock.now_ms(), timeout_ms);
    loop {
        if condition() {
            return Ok(());
        }
        let now = clock.now_ms();
        if deadline.is_expired(now) {
            return Err(Error::Timeout);
        }
        clock
            .sleep_ms(interval_ms.min(deadline.remaining_ms(now)))
            .await;
    }
}

/// Reconnect pause after `failures` consecutive failures:
/// 2 s, 4 s, 8 s ... capped at 120 s.
pub fn backoff_ms(failures: u32) -> u64 {
    let shift = failures.min(6);
    BACKOFF_MIN_MS
        .saturating_mul(1u64 << shift)
        .min(BACKOFF_MAX_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    struct FakeClock {
        now: u64,
        sleeps: usize,
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.now
        }

        async fn sleep_ms(&mut self, ms: u64) {
            self.now += ms;
            self.sleeps += 1;
        }
    }

    #[test]
    fn succeeds_immediately_without_sleeping() {
        let mut clock = FakeClock { now: 0, sleeps: 0 };
        assert_eq!(block_on(poll_until(&mut clock, 10_000, 500, || true)), Ok(()));
        assert_eq!(clock.sleeps, 0);
    }

    #[test]
    fn times_out_after_budget() {
        let mut clock = FakeClock { now: 1_000, sleeps: 0 };
        let result = block_on(poll_until(&mut clock, 10_000, 500, || false));
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(clock.now, 11_000);
        assert_eq!(clock.sleeps, 20);
    }

    #[test]
    fn condition_met_mid_wait() {
        let mut clock = FakeClock { now: 0, sleeps: 0 };
        let mut polls = 0;
        let result = block_on(poll_until(&mut clock, 10_000, 500, || {
            polls += 1;
            polls == 4
        }));
        assert_eq!(result, Ok(()));
        assert_eq!(clock.now, 1_500);
    }

    #[test]
    fn last_sleep_is_trimmed_to_deadline() {
        let mut clock = FakeClock { now: 0, sleeps: 0 };
        let _ = block_on(poll_until(&mut clock, 1_200, 500, || false));
        assert_eq!(clock.now, 1_200);
    }

    #[test]
    fn deadline_arithmetic() {
        let d = Deadline::after(100, 50);
        assert!(!d.is_expired(149));
        assert!(d.is_expired(150));
        assert_eq!(d.remaining_ms(120), 30);
        assert_eq!(d.remaining_ms(500), 0);
        assert!(!Deadline::after(u64::MAX - 1, 10).is_expired(u64::MAX - 1));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_ms(0), 2_000);
        assert_eq!(backoff_ms(1), 4_000);
        assert_eq!(backoff_ms(5), 64_000);
        assert_eq!(backoff_ms(6), 120_000);
        assert_eq!(backoff_ms(1_000), 120_000);
    }
}
