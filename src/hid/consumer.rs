//! Consumer Control HID support - media volume keys.
//!
//! Consumer Control is a separate HID usage page (0x0C).  The knob only
//! needs volume up/down, sent as a press report followed by an all-zero
//! release report.

/// Consumer control report size (2 bytes for usage ID).
pub const CONSUMER_REPORT_SIZE: usize = 2;

/// Consumer control usage codes (Usage Page 0x0C) the device emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ConsumerUsage {
    /// No action.
    None = 0x0000,
    /// Volume up.
    VolumeUp = 0x00E9,
    /// Volume down.
    VolumeDown = 0x00EA,
}

/// Consumer Control HID report.
///
/// 2-byte report containing a single usage code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConsumerReport {
    /// Active consumer control usage (little-endian u16).
    pub usage: u16,
}

impl ConsumerReport {
    /// No keys pressed.
    pub const fn empty() -> Self {
        Self { usage: 0 }
    }

    pub const fn new(usage: ConsumerUsage) -> Self {
        Self {
            usage: usage as u16,
        }
    }

    /// Serialize to report bytes.
    #[cfg(test)]
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < CONSUMER_REPORT_SIZE {
            return 0;
        }
        buf[..CONSUMER_REPORT_SIZE].copy_from_slice(&self.usage.to_le_bytes());
        CONSUMER_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; CONSUMER_REPORT_SIZE] {
        self.usage.to_le_bytes()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.usage == 0
    }
}
