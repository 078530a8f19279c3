//! User interface subsystem - OLED display + alert buzzer.
//!
//! The main loop turns [`Effect::Render`](knobby::app::Effect) and
//! [`Effect::Alert`](knobby::app::Effect) into calls on these two.
//!
//! ## Components
//!
//! - **Display**: SSD1306 128×64 OLED via I²C
//! - **Buzzer**: active buzzer on a push-pull GPIO

pub mod display;

use esp_hal::gpio::Output;

/// Timer-expiry alert output.
pub struct Buzzer<'d> {
    pin: Output<'d>,
}

impl<'d> Buzzer<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }

    pub fn set(&mut self, on: bool) {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}
