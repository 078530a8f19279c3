//! SSD1306 OLED display wrapper.
//!
//! Every [`Screen`] variant is laid out in [`draw`]; nothing else touches
//! the frame buffer.

use core::fmt::Write;

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Text;
use heapless::String;
use knobby::app::{MenuItem, PauseAction, Screen};
use knobby::config::{PORTAL_AP_ADDRESS, PORTAL_AP_SSID};
use knobby::timer::mm_ss;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

/// Concrete display driver, generic over the HAL's I²C bus.
pub type Display<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// Initialise the SSD1306 display and clear the screen.
///
/// `None` when the panel does not acknowledge on the bus.
pub fn init<I2C>(i2c: I2C, address: u8) -> Option<Display<I2C>>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new_custom_address(i2c, address);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    display.init().ok()?;
    display.clear_buffer();
    display.flush().ok()?;
    Some(display)
}

fn style(font: &'static MonoFont<'static>) -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(font)
        .text_color(BinaryColor::On)
        .build()
}

fn line<I2C>(display: &mut Display<I2C>, text: &str, y: i32)
where
    I2C: embedded_hal::i2c::I2c,
{
    let _ = Text::new(text, Point::new(0, y), style(&FONT_6X10)).draw(display);
}

fn big<I2C>(display: &mut Display<I2C>, text: &str, y: i32)
where
    I2C: embedded_hal::i2c::I2c,
{
    let _ = Text::new(text, Point::new(0, y), style(&FONT_10X20)).draw(display);
}

fn link(up: bool) -> &'static str {
    if up {
        "OK"
    } else {
        "--"
    }
}

fn marker(selected: bool) -> &'static str {
    if selected {
        "> "
    } else {
        "  "
    }
}

/// Render one frame.
pub fn draw<I2C>(display: &mut Display<I2C>, screen: &Screen)
where
    I2C: embedded_hal::i2c::I2c,
{
    display.clear_buffer();

    match *screen {
        Screen::Welcome => {
            big(display, "Knobby OS", 20);
            line(display, "Initializing...", 40);
        }
        Screen::Standby { wifi, ble, time } => {
            let mut status: String<24> = String::new();
            let _ = write!(status, "WiFi {}   BT {}", link(wifi), link(ble));
            line(display, &status, 10);
            match time {
                Some(time) => {
                    big(display, &time.clock_text(), 36);
                    let _ = Text::new(time.meridiem(), Point::new(54, 36), style(&FONT_6X10))
                        .draw(display);
                    line(display, &time.date_text(), 58);
                }
                None => {
                    big(display, "No Time", 36);
                    line(display, "(WiFi needed)", 58);
                }
            }
        }
        Screen::Menu { selection } => {
            line(display, "Menu", 10);
            for (row, item) in MenuItem::ALL.iter().enumerate() {
                let mut text: String<24> = String::new();
                let _ = text.push_str(marker(row == selection));
                let _ = text.push_str(item.label());
                line(display, &text, 26 + row as i32 * 12);
            }
        }
        Screen::Volume { ble } => {
            big(display, "Volume", 20);
            line(display, "Turn to adjust", 40);
            if !ble {
                line(display, "BT not connected", 56);
            }
        }
        Screen::Wake { ble } => {
            big(display, "Wake", 20);
            line(display, if ble { "Sending keys..." } else { "BT not connected" }, 40);
            line(display, "Press to exit", 56);
        }
        Screen::TimerSet { minutes } => {
            line(display, "Set timer", 10);
            let mut text: String<16> = String::new();
            let _ = write!(text, "{minutes} min");
            big(display, &text, 36);
            line(display, "Press to start", 56);
        }
        Screen::TimerRunning { remaining_secs } => {
            line(display, "Timer", 10);
            big(display, &clock_text(remaining_secs), 36);
            line(display, "Press to pause", 56);
        }
        Screen::TimerPaused {
            selection,
            remaining_secs,
        } => {
            let mut title: String<24> = String::new();
            let _ = write!(title, "Paused {}", clock_text(remaining_secs).as_str());
            line(display, &title, 10);
            for (row, action) in PauseAction::ALL.iter().enumerate() {
                let mut text: String<16> = String::new();
                let _ = text.push_str(marker(row == selection));
                let _ = text.push_str(action.label());
                line(display, &text, 30 + row as i32 * 12);
            }
        }
        Screen::TimerEnded => {
            big(display, "Time up!", 28);
            line(display, "Press to stop", 50);
        }
        Screen::Updating => {
            big(display, "Updating", 28);
            line(display, "Do not power off", 50);
        }
        Screen::Restarting => {
            big(display, "Restarting", 36);
        }
        Screen::Portal => {
            line(display, "WiFi setup", 10);
            let mut text: String<24> = String::new();
            let _ = write!(text, "Join {PORTAL_AP_SSID}");
            line(display, &text, 28);
            text.clear();
            let [a, b, c, d] = PORTAL_AP_ADDRESS;
            let _ = write!(text, "Open {a}.{b}.{c}.{d}");
            line(display, &text, 42);
        }
    }

    let _ = display.flush();
}

fn clock_text(total_secs: u32) -> String<8> {
    let (minutes, seconds) = mm_ss(total_secs);
    let mut text = String::new();
    let _ = write!(text, "{minutes:02}:{seconds:02}");
    text
}
