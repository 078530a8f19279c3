//! Countdown timer owned by the application state machine.
//!
//! While running the deadline is authoritative; while paused the captured
//! remaining duration is.  Resuming rebuilds the deadline from that capture
//! so time spent paused is neither lost nor gained.

use crate::config::{TIMER_DEFAULT_MINUTES, TIMER_MAX_MINUTES, TIMER_MIN_MINUTES};

const MS_PER_MINUTE: u64 = 60_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    Idle,
    Running { end_ms: u64 },
    Paused { remaining_ms: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Countdown {
    minutes: u32,
    phase: Phase,
}

impl Countdown {
    pub const fn new() -> Self {
        Self {
            minutes: TIMER_DEFAULT_MINUTES,
            phase: Phase::Idle,
        }
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// Move the configured duration by `delta` minutes, clamped.
    /// Returns `true` if the value changed.
    pub fn adjust(&mut self, delta: i32) -> bool {
        let wanted = i64::from(self.minutes) + i64::from(delta);
        let clamped = wanted.clamp(i64::from(TIMER_MIN_MINUTES), i64::from(TIMER_MAX_MINUTES)) as u32;
        let changed = clamped != self.minutes;
        self.minutes = clamped;
        changed
    }

    pub fn start(&mut self, now_ms: u64) {
        let end_ms = now_ms + u64::from(self.minutes) * MS_PER_MINUTE;
        self.phase = Phase::Running { end_ms };
    }

    pub fn pause(&mut self, now_ms: u64) {
        if let Phase::Running { end_ms } = self.phase {
            self.phase = Phase::Paused {
                remaining_ms: end_ms.saturating_sub(now_ms),
            };
        }
    }

    pub fn resume(&mut self, now_ms: u64) {
        if let Phase::Paused { remaining_ms } = self.phase {
            self.phase = Phase::Running {
                end_ms: now_ms + remaining_ms,
            };
        }
    }

    pub fn stop(&mut self) {
        self.phase = Phase::Idle;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, Phase::Paused { .. })
    }

    /// Remaining time in milliseconds.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.phase {
            Phase::Idle => 0,
            Phase::Running { end_ms } => end_ms.saturating_sub(now_ms),
            Phase::Paused { remaining_ms } => remaining_ms,
        }
    }

    /// Whole seconds left, rounded down.
    pub fn remaining_secs(&self, now_ms: u64) -> u32 {
        (self.remaining_ms(now_ms) / 1_000) as u32
    }

    /// A running countdown has expired once fewer than one whole second
    /// remains.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.is_running() && self.remaining_secs(now_ms) == 0
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Split seconds into `(minutes, seconds)` for an `MM:SS` readout.
pub fn mm_ss(total_secs: u32) -> (u32, u32) {
    (total_secs / 60, total_secs % 60)
}
