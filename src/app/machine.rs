use crate::config::{
    MENU_ITEM_COUNT, PAUSE_ITEM_COUNT, STANDBY_TIMEOUT_MS, VOLUME_MAX_STEPS_PER_TICK,
    WAKE_KEY_INTERVAL_MS,
};
use crate::input::ButtonEvent;
use crate::timer::Countdown;

use super::selection::step;
use super::{AppState, Effect, Effects, MenuItem, PauseAction, Screen, Tick};

/// The application context: current mode plus everything the modes own.
pub struct StateMachine {
    state: AppState,
    menu_selection: usize,
    pause_selection: usize,
    countdown: Countdown,
    /// Last time input was seen while in the menu.
    last_input_ms: u64,
    /// Last wake keystroke slot.
    last_wake_ms: u64,
    /// Frame most recently handed to the display; `None` forces a redraw.
    last_rendered: Option<Screen>,
}

impl StateMachine {
    /// Start in Standby.
    pub fn new(now_ms: u64) -> Self {
        Self {
            state: AppState::Standby,
            menu_selection: 0,
            pause_selection: 0,
            countdown: Countdown::new(),
            last_input_ms: now_ms,
            last_wake_ms: now_ms,
            last_rendered: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn is_standby(&self) -> bool {
        self.state == AppState::Standby
    }

    pub fn menu_selection(&self) -> usize {
        self.menu_selection
    }

    pub fn pause_selection(&self) -> usize {
        self.pause_selection
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    /// Forget what is on the display, e.g. after something outside the
    /// machine drew over it.
    pub fn invalidate(&mut self) {
        self.last_rendered = None;
    }

    /// Advance one main-loop iteration.
    pub fn tick(&mut self, tick: Tick) -> Effects {
        let mut effects = Effects::new();
        let now = tick.now_ms;
        let delta = tick.input.delta;
        let pressed = tick.input.button == ButtonEvent::ShortPress;

        match self.state {
            AppState::Standby => {
                if !tick.input.is_idle() {
                    self.enter(AppState::Menu, now);
                }
            }

            AppState::Menu => {
                if !tick.input.is_idle() {
                    self.last_input_ms = now;
                }
                if delta != 0 {
                    self.menu_selection = step(self.menu_selection, delta, MENU_ITEM_COUNT);
                }
                if pressed {
                    let next = match MenuItem::from_index(self.menu_selection) {
                        MenuItem::Volume => AppState::Volume,
                        MenuItem::Wake => AppState::Wake,
                        MenuItem::Timer => AppState::TimerSet,
                    };
                    self.enter(next, now);
                } else if now.saturating_sub(self.last_input_ms) >= STANDBY_TIMEOUT_MS {
                    debug!("menu idle, entering standby");
                    self.enter(AppState::Standby, now);
                }
            }

            AppState::Volume => {
                let steps = delta.unsigned_abs().min(VOLUME_MAX_STEPS_PER_TICK);
                let key = if delta > 0 {
                    Effect::VolumeUp
                } else {
                    Effect::VolumeDown
                };
                for _ in 0..steps {
                    push(&mut effects, key);
                }
                if pressed {
                    self.enter(AppState::Menu, now);
                }
            }

            AppState::Wake => {
                if pressed {
                    self.enter(AppState::Menu, now);
                } else if now.saturating_sub(self.last_wake_ms) >= WAKE_KEY_INTERVAL_MS {
                    self.last_wake_ms = now;
                    if tick.hid_connected {
                        push(&mut effects, Effect::WakeKeystroke);
                    }
                }
            }

            AppState::TimerSet => {
                if delta != 0 {
                    self.countdown.adjust(delta);
                }
                if pressed {
                    self.countdown.start(now);
                    info!("timer started: {} min", self.countdown.minutes());
                    self.enter(AppState::TimerRunning, now);
                }
            }

            AppState::TimerRunning => {
                if pressed {
                    self.countdown.pause(now);
                    self.enter(AppState::TimerPaused, now);
                } else if self.countdown.is_expired(now) {
                    info!("timer expired");
                    self.countdown.stop();
                    self.enter(AppState::TimerEnded, now);
                    push(&mut effects, Effect::Alert(true));
                }
            }

            AppState::TimerPaused => {
                if delta != 0 {
                    self.pause_selection = step(self.pause_selection, delta, PAUSE_ITEM_COUNT);
                }
                if pressed {
                    match PauseAction::from_index(self.pause_selection) {
                        PauseAction::Resume => {
                            self.countdown.resume(now);
                            self.enter(AppState::TimerRunning, now);
                        }
                        PauseAction::Stop => {
                            self.countdown.stop();
                            self.enter(AppState::Menu, now);
                        }
                    }
                }
            }

            AppState::TimerEnded => {
                if pressed {
                    push(&mut effects, Effect::Alert(false));
                    self.enter(AppState::Menu, now);
                }
            }
        }

        let screen = self.screen(&tick);
        if self.last_rendered != Some(screen) {
            self.last_rendered = Some(screen);
            push(&mut effects, Effect::Render(screen));
        }

        effects
    }

    /// The frame describing the current state.
    pub fn screen(&self, tick: &Tick) -> Screen {
        match self.state {
            AppState::Standby if tick.provisioning => Screen::Portal,
            AppState::Standby => Screen::Standby {
                wifi: tick.network_up,
                ble: tick.hid_connected,
                time: tick.wall_time,
            },
            AppState::Menu => Screen::Menu {
                selection: self.menu_selection,
            },
            AppState::Volume => Screen::Volume {
                ble: tick.hid_connected,
            },
            AppState::Wake => Screen::Wake {
                ble: tick.hid_connected,
            },
            AppState::TimerSet => Screen::TimerSet {
                minutes: self.countdown.minutes(),
            },
            AppState::TimerRunning => Screen::TimerRunning {
                remaining_secs: self.countdown.remaining_secs(tick.now_ms),
            },
            AppState::TimerPaused => Screen::TimerPaused {
                selection: self.pause_selection,
                remaining_secs: self.countdown.remaining_secs(tick.now_ms),
            },
            AppState::TimerEnded => Screen::TimerEnded,
        }
    }

    fn enter(&mut self, state: AppState, now: u64) {
        debug!("state {} -> {}", self.state, state);
        match state {
            AppState::Menu => {
                self.menu_selection = 0;
                self.last_input_ms = now;
            }
            AppState::TimerPaused => self.pause_selection = 0,
            AppState::Wake => self.last_wake_ms = now,
            _ => {}
        }
        self.state = state;
        self.last_rendered = None;
    }
}

fn push(effects: &mut Effects, effect: Effect) {
    if effects.push(effect).is_err() {
        warn!("effect queue full, dropping {}", effect);
    }
}
