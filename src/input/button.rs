//! Push-button press classification.
//!
//! Fed from the SW-line interrupt on both edges.  A press is measured from
//! the first pressed edge to the released edge and resolves to exactly one
//! [`ButtonEvent`]; presses shorter than the debounce floor vanish.

use portable_atomic::{AtomicU32, AtomicU8, Ordering};

use crate::config::{BUTTON_DEBOUNCE_MS, BUTTON_LONG_PRESS_MS};

/// Classified button press.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ButtonEvent {
    #[default]
    None = 0,
    ShortPress = 1,
    LongPress = 2,
}

impl ButtonEvent {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ButtonEvent::ShortPress,
            2 => ButtonEvent::LongPress,
            _ => ButtonEvent::None,
        }
    }

    pub fn is_press(self) -> bool {
        self != ButtonEvent::None
    }
}

/// Map a held duration onto an event.
pub fn classify(held_ms: u32) -> ButtonEvent {
    if held_ms >= BUTTON_LONG_PRESS_MS {
        ButtonEvent::LongPress
    } else if held_ms >= BUTTON_DEBOUNCE_MS {
        ButtonEvent::ShortPress
    } else {
        ButtonEvent::None
    }
}

/// Press tracker shared between interrupt and main loop.
///
/// `press_start == 0` means no press is being tracked.  Timestamps are
/// clamped to at least 1 so a press at t=0 is still tracked.
pub struct ButtonClassifier {
    press_start: AtomicU32,
    pending: AtomicU8,
}

impl ButtonClassifier {
    pub const fn new() -> Self {
        Self {
            press_start: AtomicU32::new(0),
            pending: AtomicU8::new(ButtonEvent::None as u8),
        }
    }

    /// Interrupt-side entry point.  `pressed` is the logical (already
    /// inverted for active-low) level after the edge.
    pub fn on_edge(&self, pressed: bool, now_ms: u32) {
        if pressed {
            // Only the first pressed edge of a press starts the measurement.
            let _ = self.press_start.compare_exchange(
                0,
                now_ms.max(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            return;
        }

        let start = self.press_start.swap(0, Ordering::AcqRel);
        if start == 0 {
            return;
        }
        let event = classify(now_ms.wrapping_sub(start));
        if event.is_press() {
            self.pending.store(event as u8, Ordering::Release);
        }
    }

    /// Main-loop side: the pending event, cleared in the same operation.
    pub fn take_event(&self) -> ButtonEvent {
        ButtonEvent::from_raw(self.pending.swap(ButtonEvent::None as u8, Ordering::AcqRel))
    }

    /// Whether a press is currently being held.
    pub fn is_held(&self) -> bool {
        self.press_start.load(Ordering::Acquire) != 0
    }
}

impl Default for ButtonClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press_for(held: u32) -> ButtonEvent {
        let button = ButtonClassifier::new();
        button.on_edge(true, 1_000);
        button.on_edge(false, 1_000 + held);
        button.take_event()
    }

    #[test]
    fn debounce_boundaries() {
        assert_eq!(press_for(19), ButtonEvent::None);
        assert_eq!(press_for(20), ButtonEvent::ShortPress);
        assert_eq!(press_for(1_999), ButtonEvent::ShortPress);
        assert_eq!(press_for(2_000), ButtonEvent::LongPress);
    }

    #[test]
    fn event_is_consumed_once() {
        let button = ButtonClassifier::new();
        button.on_edge(true, 100);
        button.on_edge(false, 200);
        assert_eq!(button.take_event(), ButtonEvent::ShortPress);
        assert_eq!(button.take_event(), ButtonEvent::None);
    }

    #[test]
    fn repeated_pressed_edge_keeps_original_start() {
        let button = ButtonClassifier::new();
        button.on_edge(true, 100);
        // Spurious second pressed edge must not restart the measurement.
        button.on_edge(true, 2_000);
        button.on_edge(false, 2_150);
        assert_eq!(button.take_event(), ButtonEvent::LongPress);
    }

    #[test]
    fn release_without_press_is_ignored() {
        let button = ButtonClassifier::new();
        button.on_edge(false, 500);
        assert_eq!(button.take_event(), ButtonEvent::None);
        assert!(!button.is_held());
    }

    #[test]
    fn press_at_time_zero_is_tracked() {
        let button = ButtonClassifier::new();
        button.on_edge(true, 0);
        assert!(button.is_held());
        button.on_edge(false, 100);
        assert_eq!(button.take_event(), ButtonEvent::ShortPress);
    }

    #[test]
    fn bounce_does_not_clear_pending_press() {
        let button = ButtonClassifier::new();
        button.on_edge(true, 100);
        button.on_edge(false, 300);
        // Contact bounce after the release.
        button.on_edge(true, 305);
        button.on_edge(false, 310);
        assert_eq!(button.take_event(), ButtonEvent::ShortPress);
    }

    #[test]
    fn millisecond_counter_wrap() {
        let button = ButtonClassifier::new();
        button.on_edge(true, u32::MAX - 10);
        button.on_edge(false, 40);
        assert_eq!(button.take_event(), ButtonEvent::ShortPress);
    }
}
