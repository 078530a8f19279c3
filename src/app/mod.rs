//! Application state machine - menu, volume, wake and timer modes.
//!
//! The machine is polled once per main-loop tick with the drained input and
//! a snapshot of link state.  It never touches hardware; instead it returns
//! a list of [`Effect`]s that the caller carries out against the display,
//! the BLE keyboard and the buzzer.
//!
//! ## Modes
//!
//! - **Standby**: status screen, any input opens the menu
//! - **Menu**: pick Volume / Wake / Timer, falls back to Standby when idle
//! - **Volume**: rotation sends consumer volume keys
//! - **Wake**: periodically taps a key so the host stays awake
//! - **Timer**: set → running → paused / ended

mod machine;
pub mod selection;


pub use machine::StateMachine;

use crate::input::InputSnapshot;
use crate::wallclock::LocalTime;

/// Current application mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppState {
    Standby,
    Menu,
    Volume,
    Wake,
    TimerSet,
    TimerRunning,
    TimerPaused,
    TimerEnded,
}

/// Main menu entries, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuItem {
    Volume,
    Wake,
    Timer,
}

impl MenuItem {
    pub const ALL: [MenuItem; 3] = [MenuItem::Volume, MenuItem::Wake, MenuItem::Timer];

    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(MenuItem::Volume)
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuItem::Volume => "1. Volume Knob",
            MenuItem::Wake => "2. Wake Mode",
            MenuItem::Timer => "3. Timer",
        }
    }
}

/// Pause screen entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PauseAction {
    Resume,
    Stop,
}

impl PauseAction {
    pub const ALL: [PauseAction; 2] = [PauseAction::Resume, PauseAction::Stop];

    pub fn label(self) -> &'static str {
        match self {
            PauseAction::Resume => "Resume",
            PauseAction::Stop => "Stop",
        }
    }

    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            PauseAction::Resume
        } else {
            PauseAction::Stop
        }
    }
}

/// Everything the display needs to draw one frame.
///
/// Screens compare by value, so the machine can tell when a redraw is
/// actually needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    /// Boot splash.
    Welcome,
    /// Idle status with link indicators and the clock, once synced.
    Standby {
        wifi: bool,
        ble: bool,
        time: Option<LocalTime>,
    },
    Menu { selection: usize },
    Volume { ble: bool },
    Wake { ble: bool },
    TimerSet { minutes: u32 },
    TimerRunning { remaining_secs: u32 },
    TimerPaused { selection: usize, remaining_secs: u32 },
    TimerEnded,
    /// Firmware download / apply in progress.
    Updating,
    Restarting,
    /// Provisioning access point is up.  Replaces Standby while it runs.
    Portal,
}

/// Side effect requested by the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    Render(Screen),
    VolumeUp,
    VolumeDown,
    WakeKeystroke,
    /// Drive the alert output on or off.
    Alert(bool),
}

/// Effects produced by one tick.
pub type Effects = heapless::Vec<Effect, 12>;

/// Inputs for one main-loop iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tick {
    pub now_ms: u64,
    pub input: InputSnapshot,
    /// A BLE central is connected and subscribed.
    pub hid_connected: bool,
    /// Station link has an IPv4 configuration.
    pub network_up: bool,
    /// Local time, `None` until the first time sync.
    pub wall_time: Option<LocalTime>,
    /// The provisioning access point is waiting for credentials.
    pub provisioning: bool,
}

impl Tick {
    pub fn idle(now_ms: u64) -> Self {
        Self {
            now_ms,
            input: InputSnapshot::IDLE,
            hid_connected: false,
            network_up: false,
            wall_time: None,
            provisioning: false,
        }
    }

    pub fn with_input(mut self, input: InputSnapshot) -> Self {
        self.input = input;
        self
    }

    pub fn with_links(mut self, hid_connected: bool, network_up: bool) -> Self {
        self.hid_connected = hid_connected;
        self.network_up = network_up;
        self
    }

    pub fn with_wall_time(mut self, wall_time: Option<LocalTime>) -> Self {
        self.wall_time = wall_time;
        self
    }

    pub fn with_provisioning(mut self, provisioning: bool) -> Self {
        self.provisioning = provisioning;
        self
    }
}
