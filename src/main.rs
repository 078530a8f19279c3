//! knobby firmware - ESP32-C3 entry point.
//!
//! Boot order:
//!
//! 1. HAL, heap, RTOS timer
//! 2. OLED splash, buzzer, encoder / button interrupts
//! 3. Flash: confirm the running OTA image, load the version record and
//!    any saved WiFi credentials
//! 4. Radio: WiFi station + portal AP, BLE controller
//! 5. Run forever, side by side:
//!    - both network stack runners
//!    - connectivity: join WiFi with saved, then built-in credentials,
//!      else run the portal; once joined, the WiFi supervisor, the restart
//!      endpoint, time sync and the mDNS responder
//!    - the portal's DHCP server
//!    - the BLE HID peripheral
//!    - the control loop (state machine, effects, update schedule)
//!
//! The knob works from the first tick, with or without a network.

#![no_std]
#![no_main]

mod ble;
mod clock;
mod mdns;
mod ota;
mod server;
mod sntp;
mod transport;
mod ui;
mod wifi;

use core::cell::RefCell;
use core::fmt::Write as _;
use core::net::Ipv4Addr;

use bt_hci::controller::ExternalController;
use critical_section::Mutex;
use defmt::{debug, info, warn};
use embassy_executor::Spawner;
use embassy_futures::join::{join, join4};
use embassy_net::{Ipv4Cidr, Stack, StackResources, StaticConfigV4};
use embassy_time::{Duration, Ticker, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Event, Input, InputConfig, Io, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::rng::Rng;
use esp_hal::time::{Instant, Rate};
use esp_hal::timer::timg::TimerGroup;
use esp_hal::{handler, ram, Blocking};
use esp_radio::ble::controller::BleConnector;
use esp_radio::wifi::WifiController;
use esp_storage::FlashStorage;
use heapless::String;
use knobby::app::{Effect, Screen, StateMachine, Tick};
use knobby::config::{
    BUILD_VERSION, DISPLAY_I2C_ADDRESS, MAIN_LOOP_TICK_MS, PORTAL_AP_ADDRESS, RESTART_GRACE_MS,
};
use knobby::firmware::{LoadedVersion, UpdateManager, UpdateOutcome, UpdateSchedule, UpdateTransport, VersionString};
use knobby::hid::keyboard::random_letter;
use knobby::hid::{consumer_tap, letter_tap, ConsumerUsage, HidReport};
use knobby::input::EventSource;
use knobby::net::{Credentials, DeviceId};
use knobby::Error;
use {esp_backtrace as _, esp_println as _};

use ble::BleController;
use ota::{EspUpdateTarget, OtaWriter};
use server::RESTART_REQUESTED;
use transport::{ClientState, HttpTransport};
use ui::display::{self, Display};
use ui::Buzzer;

esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

type Oled = Display<I2c<'static, Blocking>>;

// ═══════════════════════════════════════════════════════════════════════════
// Interrupt-side input
// ═══════════════════════════════════════════════════════════════════════════

static EVENTS: EventSource = EventSource::new();

/// Encoder CLK and DT.
static ENCODER_PINS: Mutex<RefCell<Option<(Input<'static>, Input<'static>)>>> =
    Mutex::new(RefCell::new(None));

static BUTTON_PIN: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));

#[handler]
#[ram]
fn gpio_handler() {
    let now_ms = Instant::now().duration_since_epoch().as_millis() as u32;
    critical_section::with(|cs| {
        if let Some((clk, dt)) = ENCODER_PINS.borrow_ref_mut(cs).as_mut() {
            if clk.is_interrupt_set() {
                clk.clear_interrupt();
                EVENTS.encoder.on_clock_edge(clk.is_high(), dt.is_high());
            }
        }
        if let Some(sw) = BUTTON_PIN.borrow_ref_mut(cs).as_mut() {
            if sw.is_interrupt_set() {
                sw.clear_interrupt();
                // Active low.
                EVENTS.button.on_edge(sw.is_low(), now_ms);
            }
        }
    });
}

// ═══════════════════════════════════════════════════════════════════════════
// Entry point
// ═══════════════════════════════════════════════════════════════════════════

#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 64 * 1024);
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    info!("knobby {} booting", BUILD_VERSION);

    // ── Display + buzzer ────────────────────────────────────────────────
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("I2C0 config rejected")
    .with_sda(peripherals.GPIO8)
    .with_scl(peripherals.GPIO9);
    // Nothing useful can happen without the panel.
    let oled: &'static mut Oled =
        mk_static!(Oled, display::init(i2c, DISPLAY_I2C_ADDRESS).expect("SSD1306 not responding"));
    display::draw(oled, &Screen::Welcome);

    let mut buzzer = Buzzer::new(Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default()));

    // ── Encoder + button ────────────────────────────────────────────────
    let pull_up = || InputConfig::default().with_pull(Pull::Up);
    let mut io = Io::new(peripherals.IO_MUX);
    io.set_interrupt_handler(gpio_handler);

    let mut clk = Input::new(peripherals.GPIO2, pull_up());
    let dt = Input::new(peripherals.GPIO3, pull_up());
    let mut sw = Input::new(peripherals.GPIO4, pull_up());
    EVENTS.encoder.reset(clk.is_high());

    critical_section::with(|cs| {
        clk.listen(Event::AnyEdge);
        sw.listen(Event::AnyEdge);
        ENCODER_PINS.borrow_ref_mut(cs).replace((clk, dt));
        BUTTON_PIN.borrow_ref_mut(cs).replace(sw);
    });

    // ── Flash: OTA state, version record, saved credentials ─────────────
    let ota = mk_static!(OtaWriter, OtaWriter::new(FlashStorage::new(peripherals.FLASH)));
    ota.mark_running_valid();
    let loaded = match ota.load_version().await {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("version record unreadable ({}), assuming {}", e, BUILD_VERSION);
            let mut version = VersionString::new();
            let _ = version.push_str(BUILD_VERSION);
            LoadedVersion {
                version,
                healed: false,
                raised: false,
            }
        }
    };
    info!("firmware version {}", loaded.version.as_str());

    let saved_credentials = match ota.load_credentials().await {
        Ok(creds) => Some(creds),
        Err(Error::NotFound) => None,
        Err(e) => {
            warn!("saved credentials unreadable: {}", e);
            None
        }
    };

    // ── Radio ───────────────────────────────────────────────────────────
    let radio = &*mk_static!(
        esp_radio::Controller<'static>,
        esp_radio::init().expect("esp-radio init failed")
    );
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()).expect("wifi init failed");
    let mac = interfaces.sta.mac_address();
    let device_id = DeviceId::from_mac(mac);
    info!("device id {}", device_id.as_str());

    let connector =
        BleConnector::new(radio, peripherals.BT, Default::default()).expect("BLE init failed");
    let ble_controller: BleController = ExternalController::new(connector);

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (sta_stack, mut sta_runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        mk_static!(StackResources<4>, StackResources::<4>::new()),
        seed,
    );

    let portal_ip = Ipv4Addr::from(PORTAL_AP_ADDRESS);
    let (ap_stack, mut ap_runner) = embassy_net::new(
        interfaces.ap,
        embassy_net::Config::ipv4_static(StaticConfigV4 {
            address: Ipv4Cidr::new(portal_ip, 24),
            gateway: Some(portal_ip),
            dns_servers: Default::default(),
        }),
        mk_static!(StackResources<3>, StackResources::<3>::new()),
        seed.rotate_left(32),
    );

    let wifi = mk_static!(WifiController<'static>, wifi_controller);
    let http_state = mk_static!(ClientState, ClientState::new());

    let mut boot_report: String<64> = String::new();
    let _ = write!(
        boot_report,
        "boot {} version {}{}",
        device_id.as_str(),
        loaded.version.as_str(),
        if loaded.healed {
            " (healed)"
        } else if loaded.raised {
            " (raised)"
        } else {
            ""
        }
    );

    let mut transport = HttpTransport::new(sta_stack, http_state);
    let control = ControlLoop {
        oled,
        buzzer: &mut buzzer,
        rng,
        ota,
        transport: &mut transport,
        updater: UpdateManager::new(device_id, loaded.version),
        boot_report: Some(boot_report),
    };

    let connectivity = async {
        bring_up_wifi(wifi, ap_stack, saved_credentials).await;
        join4(
            wifi::supervise(wifi, sta_stack),
            server::serve(sta_stack),
            sntp::run(sta_stack),
            mdns::run(sta_stack),
        )
        .await
    };

    let _ = join(
        join(sta_runner.run(), ap_runner.run()),
        join4(
            connectivity,
            wifi::portal::serve_dhcp(ap_stack),
            ble::run(ble_controller, mac),
            control.run(),
        ),
    )
    .await;
    unreachable!()
}

/// Saved credentials first, then the built-in ones, then the provisioning
/// portal.  Returns once the station is associated.
async fn bring_up_wifi(
    wifi: &mut WifiController<'static>,
    ap_stack: Stack<'_>,
    saved: Option<Credentials>,
) {
    for creds in [saved, wifi::builtin_credentials()].into_iter().flatten() {
        if wifi::join(wifi, &creds).await.is_ok() {
            return;
        }
        let _ = wifi.stop_async().await;
    }
    let creds = wifi::portal::provision(wifi, ap_stack).await;
    wifi::portal::ACCEPTED.signal(creds);
}

// ═══════════════════════════════════════════════════════════════════════════
// Control loop
// ═══════════════════════════════════════════════════════════════════════════

struct ControlLoop<'a> {
    oled: &'a mut Oled,
    buzzer: &'a mut Buzzer<'static>,
    rng: Rng,
    ota: &'a mut OtaWriter,
    transport: &'a mut HttpTransport<'static>,
    updater: UpdateManager<'static>,
    /// Sent to the log sink once the network first comes up.
    boot_report: Option<String<64>>,
}

impl ControlLoop<'_> {
    async fn run(mut self) -> ! {
        let boot_ms = clock::now_ms();
        let mut machine = StateMachine::new(boot_ms);
        let mut schedule = UpdateSchedule::new(boot_ms);
        let mut ticker = Ticker::every(Duration::from_millis(MAIN_LOOP_TICK_MS));

        loop {
            ticker.next().await;

            if RESTART_REQUESTED.signaled() {
                self.buzzer.set(false);
                display::draw(self.oled, &Screen::Restarting);
                Timer::after_millis(RESTART_GRACE_MS).await;
                esp_hal::system::software_reset();
            }

            if let Some(creds) = wifi::portal::ACCEPTED.try_take() {
                if let Err(e) = self.ota.save_credentials(&creds).await {
                    warn!("could not save credentials: {}", e);
                }
            }

            let now_ms = clock::now_ms();
            let tick = Tick::idle(now_ms)
                .with_input(EVENTS.drain())
                .with_links(ble::is_connected(), self.transport.is_connected())
                .with_wall_time(sntp::WALL_CLOCK.local_time(now_ms))
                .with_provisioning(wifi::portal::is_active());

            for effect in machine.tick(tick) {
                self.apply(effect);
            }

            if tick.network_up {
                if let Some(line) = self.boot_report.take() {
                    self.transport.remote_log(&line).await;
                }
            }

            if schedule.due(tick.now_ms, machine.is_standby() && tick.network_up) {
                self.check_for_update().await;
                machine.invalidate();
            }
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Render(screen) => display::draw(self.oled, &screen),
            Effect::VolumeUp => send_tap(consumer_tap(ConsumerUsage::VolumeUp)),
            Effect::VolumeDown => send_tap(consumer_tap(ConsumerUsage::VolumeDown)),
            Effect::WakeKeystroke => {
                let letter = random_letter(self.rng.random());
                if let Some(tap) = letter_tap(letter) {
                    send_tap(tap);
                }
            }
            Effect::Alert(on) => self.buzzer.set(on),
        }
    }

    async fn check_for_update(&mut self) {
        let mut target = EspUpdateTarget {
            ota: &mut *self.ota,
            display: &mut *self.oled,
        };
        let outcome = self
            .updater
            .check_and_apply(&mut *self.transport, &mut target)
            .await;

        let mut line: String<64> = String::new();
        match outcome {
            UpdateOutcome::Skipped => return,
            UpdateOutcome::UpToDate => {
                let _ = line.push_str("update check: up to date");
            }
            UpdateOutcome::Failed(e) => {
                warn!("update cycle failed: {}", e);
                let _ = write!(line, "update check failed: {e}");
            }
            UpdateOutcome::Restarting(_) => {
                let _ = line.push_str("update applied");
            }
        }
        self.transport.remote_log(&line).await;
    }
}

/// Press and release go out together or not at all.
fn send_tap(tap: [HidReport; 2]) {
    if !ble::send_tap(tap) {
        debug!("HID tap dropped (no central or queue full)");
    }
}
