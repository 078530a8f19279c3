//! GATT attribute table for HID-over-GATT.
//!
//! One HID service with two input reports (keyboard, consumer control) and
//! the keyboard LED output report, plus a battery service because several
//! hosts refuse HID devices without one.

use knobby::hid::{
    CONSUMER_REPORT_ID, KEYBOARD_REPORT_ID, REPORT_MAP, REPORT_MAP_LEN,
};
use trouble_host::prelude::*;

/// Report Reference descriptor types.
const REPORT_TYPE_INPUT: u8 = 1;
const REPORT_TYPE_OUTPUT: u8 = 2;

#[gatt_server]
pub struct Server {
    pub hid_service: HidService,
    pub battery_service: BatteryService,
}

#[gatt_service(uuid = service::HUMAN_INTERFACE_DEVICE)]
pub struct HidService {
    /// bcdHID 1.1, country 0, flags: remote wake + normally connectable.
    #[characteristic(uuid = "2a4a", read, value = [0x01, 0x01, 0x00, 0x03])]
    pub hid_info: [u8; 4],
    #[characteristic(uuid = "2a4b", read, value = REPORT_MAP)]
    pub report_map: [u8; REPORT_MAP_LEN],
    #[characteristic(uuid = "2a4c", write_without_response)]
    pub hid_control_point: u8,
    /// 1 = report protocol.
    #[characteristic(uuid = "2a4e", read, write_without_response, value = 1)]
    pub protocol_mode: u8,
    #[descriptor(uuid = "2908", read, value = [KEYBOARD_REPORT_ID, REPORT_TYPE_INPUT])]
    #[characteristic(uuid = "2a4d", read, notify)]
    pub keyboard_input: [u8; 8],
    #[descriptor(uuid = "2908", read, value = [CONSUMER_REPORT_ID, REPORT_TYPE_INPUT])]
    #[characteristic(uuid = "2a4d", read, notify)]
    pub consumer_input: [u8; 2],
    /// Host LED state; accepted and ignored.
    #[descriptor(uuid = "2908", read, value = [KEYBOARD_REPORT_ID, REPORT_TYPE_OUTPUT])]
    #[characteristic(uuid = "2a4d", read, write, write_without_response)]
    pub keyboard_output: [u8; 1],
}

#[gatt_service(uuid = service::BATTERY)]
pub struct BatteryService {
    /// Mains powered; always full.
    #[characteristic(uuid = characteristic::BATTERY_LEVEL, read, notify, value = 100)]
    pub level: u8,
}
