//! When to run an update check.
//!
//! The first check is due shortly after boot, later ones hourly.  A check
//! that falls due while the device is busy or offline stays due until the
//! next eligible tick instead of being dropped.

use crate::config::{UPDATE_CHECK_INTERVAL_MS, UPDATE_FIRST_CHECK_DELAY_MS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UpdateSchedule {
    next_due_ms: u64,
    interval_ms: u64,
}

impl UpdateSchedule {
    pub const fn new(boot_ms: u64) -> Self {
        Self::with_timing(boot_ms, UPDATE_FIRST_CHECK_DELAY_MS, UPDATE_CHECK_INTERVAL_MS)
    }

    pub const fn with_timing(boot_ms: u64, first_delay_ms: u64, interval_ms: u64) -> Self {
        Self {
            next_due_ms: boot_ms + first_delay_ms,
            interval_ms,
        }
    }

    /// `true` if a check should run now.  Claiming a slot books the next
    /// one a full interval later.
    pub fn due(&mut self, now_ms: u64, eligible: bool) -> bool {
        if !eligible || now_ms < self.next_due_ms {
            return false;
        }
        self.next_due_ms = now_ms + self.interval_ms;
        true
    }

    pub fn next_due_ms(&self) -> u64 {
        self.next_due_ms
    }
}
