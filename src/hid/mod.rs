//! HID report types for the BLE keyboard / media-key service.
//!
//! One HID-over-GATT service carries two input reports distinguished by
//! report ID: a boot-layout keyboard (ID 1) and a consumer control (ID 2).

pub mod consumer;
pub mod keyboard;
pub mod queue;


pub use consumer::{ConsumerReport, ConsumerUsage};
pub use keyboard::KeyboardReport;
pub use queue::ReportQueue;

/// Report ID of the keyboard input report.
pub const KEYBOARD_REPORT_ID: u8 = 1;

/// Report ID of the consumer control input report.
pub const CONSUMER_REPORT_ID: u8 = 2;

/// Report sent to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Consumer(ConsumerReport),
}

#[cfg(test)]
impl HidReport {
    pub fn report_id(&self) -> u8 {
        match self {
            HidReport::Keyboard(_) => KEYBOARD_REPORT_ID,
            HidReport::Consumer(_) => CONSUMER_REPORT_ID,
        }
    }

    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match self {
            HidReport::Keyboard(k) => k.serialize(buf),
            HidReport::Consumer(c) => c.serialize(buf),
        }
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, HidReport::Keyboard(_))
    }

    pub fn is_consumer(&self) -> bool {
        matches!(self, HidReport::Consumer(_))
    }
}

/// Press + release pair for one consumer key.
pub fn consumer_tap(usage: ConsumerUsage) -> [HidReport; 2] {
    [
        HidReport::Consumer(ConsumerReport::new(usage)),
        HidReport::Consumer(ConsumerReport::empty()),
    ]
}

/// Press + release pair for one letter key, `None` for non-letters.
pub fn letter_tap(letter: char) -> Option<[HidReport; 2]> {
    keyboard::tap(letter).map(|[press, release]| {
        [HidReport::Keyboard(press), HidReport::Keyboard(release)]
    })
}

/// Length of [`REPORT_MAP`] in bytes.
pub const REPORT_MAP_LEN: usize = 91;

/// Report Map characteristic value: keyboard (ID 1) + consumer (ID 2).
///
/// The keyboard half is the standard boot keyboard with LED output; the
/// consumer half is a single 16-bit usage array.
pub const REPORT_MAP: [u8; REPORT_MAP_LEN] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x85, KEYBOARD_REPORT_ID, //   Report ID (1)
    //
    //   - Modifier keys (8 bits) -
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0, //   Usage Minimum (Left Control)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    //   - Reserved byte -
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant)
    //
    //   - LED output (5 bits + 3 padding) -
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (Num Lock)
    0x29, 0x05, //   Usage Maximum (Kana)
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant)
    //
    //   - Key codes (6 bytes) -
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0xFF, //   Usage Maximum (255)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x00, //   Input (Data, Array)
    0xC0, // End Collection
    //
    0x05, 0x0C, // Usage Page (Consumer)
    0x09, 0x01, // Usage (Consumer Control)
    0xA1, 0x01, // Collection (Application)
    0x85, CONSUMER_REPORT_ID, //   Report ID (2)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x03, //   Logical Maximum (1023)
    0x19, 0x00, //   Usage Minimum (0)
    0x2A, 0xFF, 0x03, //   Usage Maximum (1023)
    0x75, 0x10, //   Report Size (16)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x00, //   Input (Data, Array, Absolute)
    0xC0, // End Collection
];
