//! Embassy-backed [`Clock`] for the deadline helpers in `knobby::retry`.

use embassy_time::{Instant, Timer};
use knobby::retry::Clock;

/// Milliseconds since boot.
pub fn now_ms() -> u64 {
    Instant::now().as_millis()
}

/// Zero-sized handle onto the embassy time driver.
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }

    async fn sleep_ms(&mut self, ms: u64) {
        Timer::after_millis(ms).await;
    }
}
