//! Encoder and button input.
//!
//! Interrupt handlers write into an [`EventSource`] held in a `static`; the
//! main loop drains it once per tick.  Everything crossing the boundary is
//! an atomic, so draining never needs a critical section.

pub mod button;
pub mod encoder;

pub use button::{ButtonClassifier, ButtonEvent};
pub use encoder::QuadratureDecoder;

/// Both input channels, shared between ISR and main loop.
pub struct EventSource {
    pub encoder: QuadratureDecoder,
    pub button: ButtonClassifier,
}

impl EventSource {
    pub const fn new() -> Self {
        Self {
            encoder: QuadratureDecoder::new(true),
            button: ButtonClassifier::new(),
        }
    }

    /// Take everything that happened since the previous drain.
    pub fn drain(&self) -> InputSnapshot {
        InputSnapshot {
            delta: self.encoder.take_delta(),
            button: self.button.take_event(),
        }
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new()
    }
}

/// One tick's worth of input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputSnapshot {
    pub delta: i32,
    pub button: ButtonEvent,
}

impl InputSnapshot {
    pub const IDLE: Self = Self {
        delta: 0,
        button: ButtonEvent::None,
    };

    pub fn rotation(delta: i32) -> Self {
        Self {
            delta,
            button: ButtonEvent::None,
        }
    }

    pub fn press(button: ButtonEvent) -> Self {
        Self { delta: 0, button }
    }

    pub fn is_idle(&self) -> bool {
        self.delta == 0 && !self.button.is_press()
    }
}
