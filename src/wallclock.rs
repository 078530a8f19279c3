//! Wall-clock time for the standby screen.
//!
//! The network task sets the clock from SNTP; the main loop reads it back
//! against its own uptime.  Until the first sync there is no time at all.

use core::fmt::Write;

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use heapless::String;
use portable_atomic::{AtomicU64, Ordering};

use crate::config::UTC_OFFSET_SECS;

const UNSET: u64 = 0;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Unix time anchored to uptime, shared between tasks.
pub struct WallClock {
    /// Unix milliseconds at uptime zero, or [`UNSET`].
    epoch_ms: AtomicU64,
}

impl WallClock {
    pub const fn new() -> Self {
        Self {
            epoch_ms: AtomicU64::new(UNSET),
        }
    }

    /// Record that it is `unix_secs` now, `now_ms` after boot.
    pub fn set(&self, unix_secs: u64, now_ms: u64) {
        let epoch = unix_secs
            .saturating_mul(1_000)
            .saturating_sub(now_ms)
            .max(1);
        self.epoch_ms.store(epoch, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.epoch_ms.load(Ordering::Relaxed) != UNSET
    }

    pub fn unix_secs(&self, now_ms: u64) -> Option<u64> {
        match self.epoch_ms.load(Ordering::Relaxed) {
            UNSET => None,
            epoch => Some((epoch + now_ms) / 1_000),
        }
    }

    /// Local time at `now_ms`, offset by [`UTC_OFFSET_SECS`].
    pub fn local_time(&self, now_ms: u64) -> Option<LocalTime> {
        LocalTime::from_unix(self.unix_secs(now_ms)?, UTC_OFFSET_SECS)
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Civil time as the standby screen shows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocalTime {
    /// 1..=12
    pub hour12: u8,
    pub minute: u8,
    pub pm: bool,
    /// 0 = Monday
    pub weekday: u8,
    /// 1..=31
    pub day: u8,
    /// 1..=12
    pub month: u8,
}

impl LocalTime {
    pub fn from_unix(unix_secs: u64, utc_offset_secs: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(utc_offset_secs)?;
        let utc = DateTime::from_timestamp(i64::try_from(unix_secs).ok()?, 0)?;
        let local = utc.with_timezone(&offset);
        let (pm, hour12) = local.hour12();
        Some(Self {
            hour12: hour12 as u8,
            minute: local.minute() as u8,
            pm,
            weekday: local.weekday().num_days_from_monday() as u8,
            day: local.day() as u8,
            month: local.month() as u8,
        })
    }

    /// `HH:MM`, zero-padded 12-hour.
    pub fn clock_text(&self) -> String<5> {
        let mut text = String::new();
        let _ = write!(text, "{:02}:{:02}", self.hour12, self.minute);
        text
    }

    pub fn meridiem(&self) -> &'static str {
        if self.pm {
            "PM"
        } else {
            "AM"
        }
    }

    /// `Www, DD Mmm`
    pub fn date_text(&self) -> String<11> {
        let weekday = WEEKDAYS.get(self.weekday as usize).copied().unwrap_or("???");
        let month = MONTHS
            .get((self.month as usize).wrapping_sub(1))
            .copied()
            .unwrap_or("???");
        let mut text = String::new();
        let _ = write!(text, "{weekday}, {:02} {month}", self.day);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_clock_has_no_time() {
        let clock = WallClock::new();
        assert!(!clock.is_set());
        assert_eq!(clock.unix_secs(5_000), None);
        assert_eq!(clock.local_time(5_000), None);
    }

    #[test]
    fn clock_advances_with_uptime() {
        let clock = WallClock::new();
        clock.set(1_740_000_000, 10_000);
        assert!(clock.is_set());
        assert_eq!(clock.unix_secs(10_000), Some(1_740_000_000));
        assert_eq!(clock.unix_secs(70_500), Some(1_740_000_060));
    }

    #[test]
    fn resync_replaces_the_anchor() {
        let clock = WallClock::new();
        clock.set(1_740_000_000, 0);
        clock.set(1_740_000_100, 60_000);
        assert_eq!(clock.unix_secs(60_000), Some(1_740_000_100));
    }

    #[test]
    fn evening_renders_in_twelve_hour_form() {
        // 2025-02-19 21:20:00 UTC
        let time = LocalTime::from_unix(1_740_000_000, 0).unwrap();
        assert_eq!(time.clock_text().as_str(), "09:20");
        assert_eq!(time.meridiem(), "PM");
        assert_eq!(time.date_text().as_str(), "Wed, 19 Feb");
    }

    #[test]
    fn midnight_is_twelve_am() {
        let time = LocalTime::from_unix(0, 0).unwrap();
        assert_eq!(time.clock_text().as_str(), "12:00");
        assert_eq!(time.meridiem(), "AM");
        assert_eq!(time.date_text().as_str(), "Thu, 01 Jan");
    }

    #[test]
    fn leap_day_and_year_end() {
        let leap = LocalTime::from_unix(1_709_164_800, 0).unwrap();
        assert_eq!(leap.date_text().as_str(), "Thu, 29 Feb");

        let last = LocalTime::from_unix(1_735_689_599, 0).unwrap();
        assert_eq!(last.clock_text().as_str(), "11:59");
        assert_eq!(last.meridiem(), "PM");
        assert_eq!(last.date_text().as_str(), "Tue, 31 Dec");
    }

    #[test]
    fn utc_offset_shifts_hour_and_day() {
        let west = LocalTime::from_unix(1_740_000_000, -5 * 3600).unwrap();
        assert_eq!(west.clock_text().as_str(), "04:20");
        assert_eq!(west.meridiem(), "PM");

        let east = LocalTime::from_unix(1_740_000_000, 3 * 3600).unwrap();
        assert_eq!(east.clock_text().as_str(), "12:20");
        assert_eq!(east.meridiem(), "AM");
        assert_eq!(east.date_text().as_str(), "Thu, 20 Feb");
    }
}
