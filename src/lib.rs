//! knobby - control core of a rotary-knob BLE media controller.
//!
//! Everything here is hardware-agnostic and runs on the host:
//!
//! - **input**: quadrature decoding and press classification, shared with
//!   interrupt handlers through atomics
//! - **app**: the menu / volume / wake / timer state machine
//! - **timer**: pause-safe countdown
//! - **firmware**: version ordering, the persisted version record and the
//!   OTA update protocol
//! - **net**: update-server URLs, JSON parsing, the on-device HTTP
//!   endpoints, saved WiFi credentials and the SNTP / mDNS packets
//! - **wallclock**: synced time of day for the standby screen
//! - **hid**: keyboard and consumer-control reports for the BLE HID service
//!
//! Usage: `cargo test --lib` on the host.
//!
//! The ESP32-C3 firmware (`main.rs`, `--features embedded`) wires these
//! modules to GPIO interrupts, the OLED, esp-radio and the OTA partitions.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Core logic
// ═══════════════════════════════════════════════════════════════════════════

pub mod app;
pub mod input;
pub mod timer;
pub mod wallclock;

// ═══════════════════════════════════════════════════════════════════════════
// Firmware update & networking
// ═══════════════════════════════════════════════════════════════════════════

pub mod firmware;
pub mod net;
pub mod retry;

// ═══════════════════════════════════════════════════════════════════════════
// HID reports
// ═══════════════════════════════════════════════════════════════════════════

pub mod hid;

// ═══════════════════════════════════════════════════════════════════════════
// Shared
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;

pub use error::Error;
