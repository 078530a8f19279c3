//! Bluetooth Low Energy subsystem.
//!
//! The device is a HID-over-GATT **peripheral**: it advertises as a
//! keyboard, accepts one central at a time and pushes input reports as
//! notifications.
//!
//! 1. **Host** - the trouble-host stack on top of the esp-radio HCI
//!    controller.
//! 2. **Advertiser** - connectable advertising with the HID service UUID
//!    and the device name; restarts after every disconnect.
//! 3. **Connection** - serves GATT requests and drains [`HID_REPORTS`]
//!    into notifications until the link drops.
//!
//! The main loop only sees [`send_tap`] and [`is_connected`].

pub mod hid_service;

use core::sync::atomic::{AtomicBool, Ordering};

use bt_hci::controller::ExternalController;
use defmt::{info, warn, Debug2Format};
use embassy_futures::join::join;
use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Timer;
use esp_radio::ble::controller::BleConnector;
use knobby::config::BLE_DEVICE_NAME;
use knobby::hid::{HidReport, ReportQueue};
use trouble_host::prelude::*;

use hid_service::Server;

/// HCI command slots shared with the radio driver.
pub const HCI_SLOTS: usize = 20;

/// Controller type the firmware runs on.
pub type BleController = ExternalController<BleConnector<'static>, HCI_SLOTS>;

/// One central at a time.
const CONNECTIONS_MAX: usize = 1;

/// Signalling + ATT.
const L2CAP_CHANNELS_MAX: usize = 2;

/// Pause before re-advertising after a host error.
const ADVERTISE_RETRY_MS: u64 = 1_000;

/// Reports waiting for the connection task.
pub static HID_REPORTS: ReportQueue<CriticalSectionRawMutex, 16> = ReportQueue::new();

static CONNECTED: AtomicBool = AtomicBool::new(false);

/// A central is connected and subscribed reports can be delivered.
pub fn is_connected() -> bool {
    CONNECTED.load(Ordering::Relaxed)
}

/// Queue a press + release pair for the connected host.  Dropped whole
/// when nobody listens or the queue cannot take both.
pub fn send_tap(tap: [HidReport; 2]) -> bool {
    if !is_connected() {
        return false;
    }
    HID_REPORTS.try_send_tap(tap)
}

/// Run the BLE host forever.  `mac` seeds the static random address.
pub async fn run(controller: BleController, mac: [u8; 6]) {
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(Address::random(static_random_address(mac)));
    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: BLE_DEVICE_NAME,
        appearance: &appearance::human_interface_device::KEYBOARD,
    })) {
        Ok(server) => server,
        Err(e) => {
            warn!("GATT table rejected: {:?}", Debug2Format(&e));
            return;
        }
    };

    let host = async {
        loop {
            if let Err(e) = runner.run().await {
                warn!("BLE host stopped: {:?}", Debug2Format(&e));
                Timer::after_millis(ADVERTISE_RETRY_MS).await;
            }
        }
    };

    let connections = async {
        loop {
            match advertise(&mut peripheral, &server).await {
                Ok(conn) => {
                    HID_REPORTS.clear();
                    CONNECTED.store(true, Ordering::Relaxed);
                    info!("BLE central connected");
                    select(gatt_events(&conn), notify_reports(&server, &conn)).await;
                    CONNECTED.store(false, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!("advertising failed: {:?}", Debug2Format(&e));
                    Timer::after_millis(ADVERTISE_RETRY_MS).await;
                }
            }
        }
    };

    join(host, connections).await;
}

/// Static random addresses carry `0b11` in the two top bits.
fn static_random_address(mac: [u8; 6]) -> [u8; 6] {
    let mut addr = mac;
    addr.reverse();
    addr[5] |= 0xC0;
    addr
}

async fn advertise<'values, 'server, C: Controller>(
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    server: &'server Server<'values>,
) -> Result<GattConnection<'values, 'server, DefaultPacketPool>, BleHostError<C::Error>> {
    let mut adv_data = [0u8; 31];
    let len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            // 0x1812, little endian
            AdStructure::ServiceUuids16(&[[0x12, 0x18]]),
            AdStructure::CompleteLocalName(BLE_DEVICE_NAME.as_bytes()),
        ],
        &mut adv_data[..],
    )?;
    let advertiser = peripheral
        .advertise(
            &Default::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data: &adv_data[..len],
                scan_data: &[],
            },
        )
        .await?;
    info!("advertising as {}", BLE_DEVICE_NAME);
    let conn = advertiser.accept().await?.with_attribute_server(server)?;
    Ok(conn)
}

/// Answer GATT requests until the central goes away.
async fn gatt_events(conn: &GattConnection<'_, '_, DefaultPacketPool>) {
    let reason = loop {
        match conn.next().await {
            GattConnectionEvent::Disconnected { reason } => break reason,
            GattConnectionEvent::Gatt { event } => match event.accept() {
                Ok(reply) => reply.send().await,
                Err(e) => warn!("GATT reply failed: {:?}", Debug2Format(&e)),
            },
            _ => {}
        }
    };
    info!("BLE central disconnected: {:?}", Debug2Format(&reason));
}

/// Forward queued reports as notifications on the matching characteristic.
async fn notify_reports(server: &Server<'_>, conn: &GattConnection<'_, '_, DefaultPacketPool>) {
    let hid = &server.hid_service;
    loop {
        let result = match HID_REPORTS.receive().await {
            HidReport::Keyboard(report) => hid.keyboard_input.notify(conn, &report.to_bytes()).await,
            HidReport::Consumer(report) => hid.consumer_input.notify(conn, &report.to_bytes()).await,
        };
        if let Err(e) = result {
            warn!("notify failed: {:?}", Debug2Format(&e));
            return;
        }
    }
}
