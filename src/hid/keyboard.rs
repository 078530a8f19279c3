//! HID keyboard input report (boot protocol layout).
//!
//! Layout (8 bytes):
//! ```text
//! Byte 0: Modifier keys (bitfield)
//!         Bit 0 = Left Ctrl,  Bit 1 = Left Shift,
//!         Bit 2 = Left Alt,   Bit 3 = Left GUI,
//!         Bit 4 = Right Ctrl, Bit 5 = Right Shift,
//!         Bit 6 = Right Alt,  Bit 7 = Right GUI
//! Byte 1: Reserved (0x00)
//! Byte 2-7: Up to 6 simultaneous key codes (HID usage codes)
//! ```

/// Keyboard report size in bytes.
pub const KEYBOARD_REPORT_SIZE: usize = 8;

/// Usage code of the `a` key; `b`..`z` follow consecutively.
const KEY_A: u8 = 0x04;

/// Boot-protocol keyboard report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// Reserved byte (always 0x00 per HID spec).
    pub reserved: u8,
    /// Up to 6 simultaneously pressed key codes.
    pub keycodes: [u8; 6],
}

impl KeyboardReport {
    /// All keys released.
    pub const fn empty() -> Self {
        Self {
            modifier: 0,
            reserved: 0,
            keycodes: [0; 6],
        }
    }

    /// A single key held, no modifiers.
    pub const fn key(code: u8) -> Self {
        Self {
            modifier: 0,
            reserved: 0,
            keycodes: [code, 0, 0, 0, 0, 0],
        }
    }

    /// Serialise into a byte slice for a GATT notification.
    /// Returns the number of bytes written (0 if `buf` is too small).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < KEYBOARD_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.modifier;
        buf[1] = self.reserved;
        buf[2..8].copy_from_slice(&self.keycodes);
        KEYBOARD_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; KEYBOARD_REPORT_SIZE] {
        let mut buf = [0u8; KEYBOARD_REPORT_SIZE];
        self.serialize(&mut buf);
        buf
    }

    /// Returns `true` if no keys are pressed (release event).
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycodes.iter().all(|&k| k == 0)
    }
}

/// Usage code for a lowercase ASCII letter.
pub fn letter_keycode(letter: char) -> Option<u8> {
    if letter.is_ascii_lowercase() {
        Some(KEY_A + (letter as u8 - b'a'))
    } else {
        None
    }
}

/// Press + release pair that types `letter` once.
pub fn tap(letter: char) -> Option<[KeyboardReport; 2]> {
    letter_keycode(letter).map(|code| [KeyboardReport::key(code), KeyboardReport::empty()])
}

/// Pick a letter from a random word.
pub fn random_letter(entropy: u32) -> char {
    (b'a' + (entropy % 26) as u8) as char
}
