//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, endpoints and storage
//! offsets live here so they can be tuned in one place.

// GPIO pin assignments (ESP32-C3 SuperMini defaults)
//
// These are logical names; the concrete `esp_hal::peripherals::GPIOx` pins
// are picked in `main.rs`.  Adjust for your custom PCB.
//
//   Encoder CLK    → GPIO2
//   Encoder DT     → GPIO3
//   Encoder SW     → GPIO4 (active-low, internal pull-up)
//   Buzzer         → GPIO5
//   I²C SDA        → GPIO8
//   I²C SCL        → GPIO9

/// I²C address of the SSD1306 OLED.
pub const DISPLAY_I2C_ADDRESS: u8 = 0x3C;

// Input

/// Presses shorter than this are contact bounce and are dropped (ms).
pub const BUTTON_DEBOUNCE_MS: u32 = 20;

/// Presses held at least this long are long presses (ms).
pub const BUTTON_LONG_PRESS_MS: u32 = 2_000;

// State machine

/// Main-loop polling period (ms).
pub const MAIN_LOOP_TICK_MS: u64 = 10;

/// Menu inactivity before dropping to Standby (ms).
pub const STANDBY_TIMEOUT_MS: u64 = 10_000;

/// Interval between synthetic keystrokes in Wake mode (ms).
pub const WAKE_KEY_INTERVAL_MS: u64 = 5_000;

/// Number of entries in the main menu (Volume, Wake, Timer).
pub const MENU_ITEM_COUNT: usize = 3;

/// Number of entries on the pause screen (Resume, Stop).
pub const PAUSE_ITEM_COUNT: usize = 2;

/// Upper bound on volume key presses emitted for one tick's rotation.
pub const VOLUME_MAX_STEPS_PER_TICK: u32 = 8;

// Timer

/// Minutes shown when the timer screen is first opened.
pub const TIMER_DEFAULT_MINUTES: u32 = 5;

/// Smallest settable countdown.
pub const TIMER_MIN_MINUTES: u32 = 1;

/// Largest settable countdown (two-digit `MM:SS` display).
pub const TIMER_MAX_MINUTES: u32 = 99;

// Firmware update server

/// Base URL of the device API.  Override with `KNOBBY_SERVER` at build time.
pub const SERVER_BASE_URL: &str = match option_env!("KNOBBY_SERVER") {
    Some(url) => url,
    None => "http://192.168.1.100:8080/api/v1/device",
};

/// Path of the version-check endpoint, relative to [`SERVER_BASE_URL`].
pub const VERSION_CHECK_PATH: &str = "/firmware/version";

/// Path of the firmware-binary endpoint, relative to [`SERVER_BASE_URL`].
pub const FIRMWARE_PATH: &str = "/firmware";

/// Path of the remote log sink, relative to [`SERVER_BASE_URL`].
pub const LOG_PATH: &str = "/logs";

/// Delay after boot before the first update check (ms).
pub const UPDATE_FIRST_CHECK_DELAY_MS: u64 = 30_000;

/// Interval between update checks (ms).
pub const UPDATE_CHECK_INTERVAL_MS: u64 = 60 * 60 * 1_000;

/// Budget for the version-check request (ms).
pub const VERSION_CHECK_TIMEOUT_MS: u64 = 10_000;

/// Budget for the whole firmware download (ms).
pub const FIRMWARE_DOWNLOAD_TIMEOUT_MS: u64 = 180_000;

/// Pause between a successful apply and the restart, so logs and
/// in-flight responses drain (ms).
pub const UPDATE_FLUSH_DELAY_MS: u64 = 1_000;

/// Attempts at writing the new version record after an apply.
pub const VERSION_PERSIST_ATTEMPTS: usize = 3;

/// Pause between version write attempts (ms).
pub const VERSION_PERSIST_RETRY_MS: u64 = 200;

// Remote logging

/// Mirror lifecycle log lines to the server's log sink.
pub const REMOTE_LOGGING: bool = false;

/// Budget for one log POST (ms).
pub const LOG_POST_TIMEOUT_MS: u64 = 2_000;

// Connectivity

/// Fallback station credentials, baked in at build time.
pub const WIFI_SSID: Option<&str> = option_env!("KNOBBY_WIFI_SSID");
pub const WIFI_PASSWORD: &str = match option_env!("KNOBBY_WIFI_PASS") {
    Some(pass) => pass,
    None => "",
};

/// Budget for one station association attempt (ms).
pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Link-state polling period while associating (ms).
pub const WIFI_POLL_INTERVAL_MS: u64 = 500;

/// SSID of the provisioning access point.
pub const PORTAL_AP_SSID: &str = "KNOBBY_SETUP";

/// Address of the device on its own access point.
pub const PORTAL_AP_ADDRESS: [u8; 4] = [10, 10, 10, 10];

/// Grace period between accepting portal credentials and tearing the
/// access point down (ms).
pub const PORTAL_ACCEPT_GRACE_MS: u64 = 2_000;

/// TCP port of the local HTTP endpoints.
pub const HTTP_PORT: u16 = 80;

/// Grace period between answering `/api/restart` and resetting (ms).
pub const RESTART_GRACE_MS: u64 = 1_000;

/// Name answered over mDNS, without the `.local` suffix.
pub const MDNS_HOSTNAME: &str = "knobcontroller";

/// TTL on mDNS answers (s).
pub const MDNS_TTL_SECS: u32 = 120;

// Wall clock

/// Time server queried once the station link is up.
pub const NTP_SERVER: &str = "pool.ntp.org";

/// Budget for one SNTP exchange, DNS lookup included (ms).
pub const NTP_TIMEOUT_MS: u64 = 5_000;

/// Interval between successful time syncs (ms).
pub const NTP_RESYNC_INTERVAL_MS: u64 = 60 * 60 * 1_000;

/// Pause before retrying a failed sync (ms).
pub const NTP_RETRY_MS: u64 = 30_000;

/// Offset of local time from UTC (s).  No daylight-saving rules are
/// applied.
pub const UTC_OFFSET_SECS: i32 = 0;

// BLE

/// Advertised device name.
pub const BLE_DEVICE_NAME: &str = "Knobby";

// Persisted version

/// Flash offset of the sector holding the version record (4 KB aligned,
/// past both OTA slots of a 4 MB part).
pub const VERSION_STORE_FLASH_OFFSET: u32 = 0x3F_F000;

/// Offset of the version string inside its sector.
pub const VERSION_RECORD_OFFSET: u32 = 64;

/// Longest storable version string (bytes, excluding terminator).
pub const VERSION_MAX_LEN: usize = 31;

/// Stored strings longer than this are treated as corrupt.
pub const VERSION_MAX_PLAUSIBLE_LEN: usize = 10;

/// Version assumed when storage is blank or corrupt.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Version this image was built as.  The stored record is never left
/// below it.
pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

// Saved WiFi credentials

/// Flash offset of the sector holding credentials saved from the portal
/// (4 KB aligned, just below the version sector).
pub const CREDENTIALS_FLASH_OFFSET: u32 = 0x3F_E000;
