//! First-boot provisioning portal.
//!
//! Opens the `KNOBBY_SETUP` access point at 10.10.10.10, leases addresses
//! to joining clients over DHCP, lists the scanned networks on `GET /` and
//! takes credentials from `POST /save`.  Submitted credentials are tried in
//! station mode; the portal comes back when they do not work.  Credentials
//! that connect are handed to the control loop through [`ACCEPTED`] to be
//! saved.

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{info, warn, Debug2Format};
use edge_dhcp::io::{self as dhcp_io, DEFAULT_SERVER_PORT};
use edge_dhcp::server::{Server, ServerOptions};
use edge_nal::UdpBind;
use edge_nal_embassy::{Udp, UdpBuffers};
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{AccessPointConfig, ClientConfig, ModeConfig, ScanConfig, WifiController};
use heapless::{String, Vec};
use knobby::config::{HTTP_PORT, PORTAL_ACCEPT_GRACE_MS, PORTAL_AP_ADDRESS, PORTAL_AP_SSID};
use knobby::net::http::{write_portal_page, Credentials, Route};

use crate::server::{read_route, respond, REQUEST_BUFFER};

/// Networks offered in the picker.
const MAX_NETWORKS: usize = 12;

/// Rendered picker page.
const PAGE_CAPACITY: usize = 2048;

const SOCKET_BUFFER: usize = 1536;

const CLIENT_TIMEOUT_SECS: u64 = 10;

/// Pause before reopening the AP after a driver error.
const REOPEN_DELAY_MS: u64 = 1_000;

const SAVED_PAGE: &[u8] =
    b"<!DOCTYPE html><html><body><h2>Saved</h2><p>Knobby is joining the network.</p></body></html>";

/// Leases the DHCP server tracks at once.
const MAX_LEASES: usize = 16;

/// Pause before restarting the DHCP server after an error.
const DHCP_RESTART_MS: u64 = 500;

type NetworkList = Vec<String<32>, MAX_NETWORKS>;

/// Credentials that joined successfully, waiting to be saved.
pub static ACCEPTED: Signal<CriticalSectionRawMutex, Credentials> = Signal::new();

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// The access point is up and waiting for credentials.
pub fn is_active() -> bool {
    ACTIVE.load(Ordering::Relaxed)
}

/// Run the portal until submitted credentials join successfully.
///
/// On return the controller is an associated station and the access point
/// is gone.
pub async fn provision(controller: &mut WifiController<'static>, ap_stack: Stack<'_>) -> Credentials {
    ACTIVE.store(true, Ordering::Relaxed);
    loop {
        if let Err(e) = open_access_point(controller).await {
            warn!("portal AP failed to start: {:?}", Debug2Format(&e));
            Timer::after_millis(REOPEN_DELAY_MS).await;
            continue;
        }
        let networks = scan(controller).await;
        info!("portal {} up, {} networks listed", PORTAL_AP_SSID, networks.len());

        let creds = collect_credentials(ap_stack, &networks).await;

        // Let the browser receive the confirmation before the AP drops.
        Timer::after_millis(PORTAL_ACCEPT_GRACE_MS).await;
        let _ = controller.stop_async().await;

        if super::join(controller, &creds).await.is_ok() {
            info!("portal credentials accepted");
            ACTIVE.store(false, Ordering::Relaxed);
            return creds;
        }
        warn!("portal credentials did not connect; reopening portal");
        let _ = controller.stop_async().await;
    }
}

async fn open_access_point(
    controller: &mut WifiController<'static>,
) -> Result<(), esp_radio::wifi::WifiError> {
    let ap = AccessPointConfig::default().with_ssid(PORTAL_AP_SSID.into());
    controller.set_config(&ModeConfig::ApSta(ClientConfig::default(), ap))?;
    controller.start_async().await
}

async fn scan(controller: &mut WifiController<'static>) -> NetworkList {
    let mut networks = NetworkList::new();
    let found = match controller.scan_with_config_async(ScanConfig::default()).await {
        Ok(found) => found,
        Err(e) => {
            warn!("wifi scan failed: {:?}", Debug2Format(&e));
            return networks;
        }
    };
    for ap in found.iter() {
        let ssid = ap.ssid.as_str();
        if ssid.is_empty() || networks.iter().any(|known| known.as_str() == ssid) {
            continue;
        }
        let mut entry = String::new();
        if entry.push_str(ssid).is_err() || networks.push(entry).is_err() {
            continue;
        }
    }
    networks
}

/// Serve the picker until a valid `POST /save` arrives.
async fn collect_credentials(stack: Stack<'_>, networks: &NetworkList) -> Credentials {
    let mut rx = [0u8; SOCKET_BUFFER];
    let mut tx = [0u8; SOCKET_BUFFER];
    let mut request = [0u8; REQUEST_BUFFER];
    let names: Vec<&str, MAX_NETWORKS> = networks.iter().map(|n| n.as_str()).collect();

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx, &mut tx);
        socket.set_timeout(Some(Duration::from_secs(CLIENT_TIMEOUT_SECS)));
        if socket.accept(HTTP_PORT).await.is_err() {
            continue;
        }

        let mut submitted = None;
        let result = match read_route(&mut socket, &mut request).await {
            Ok(Route::PortalForm) => {
                let mut page: String<PAGE_CAPACITY> = String::new();
                if write_portal_page(&mut page, &names).is_err() {
                    warn!("portal page truncated");
                }
                respond(&mut socket, 200, "text/html", page.as_bytes()).await
            }
            Ok(Route::PortalSave(creds)) => {
                info!("portal received credentials for {}", creds.ssid.as_str());
                submitted = Some(creds);
                respond(&mut socket, 200, "text/html", SAVED_PAGE).await
            }
            Ok(_) => respond(&mut socket, 404, "text/plain", b"not found").await,
            Err(_) => respond(&mut socket, 400, "text/plain", b"bad request").await,
        };
        if let Err(e) = result {
            warn!("portal client dropped: {}", e);
        }
        socket.close();
        let _ = socket.flush().await;

        if let Some(creds) = submitted {
            return creds;
        }
    }
}

/// Lease addresses on the access-point subnet, forever.  Idle while the
/// access point is down.
pub async fn serve_dhcp(ap_stack: Stack<'_>) -> ! {
    let ip = Ipv4Addr::from(PORTAL_AP_ADDRESS);
    let buffers = UdpBuffers::<1, 1024, 1024, 4>::new();
    let udp = Udp::new(ap_stack, &buffers);
    let mut packet = [0u8; 1500];
    let mut gateways = [ip];

    loop {
        let mut socket = match udp
            .bind(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_SERVER_PORT)))
            .await
        {
            Ok(socket) => socket,
            Err(e) => {
                warn!("dhcp bind failed: {:?}", Debug2Format(&e));
                Timer::after_millis(DHCP_RESTART_MS).await;
                continue;
            }
        };

        let mut server = Server::<_, MAX_LEASES>::new_with_et(ip);
        let options = ServerOptions::new(ip, Some(&mut gateways));
        if let Err(e) = dhcp_io::server::run(&mut server, &options, &mut socket, &mut packet).await {
            warn!("dhcp server stopped: {:?}", Debug2Format(&e));
        }
        Timer::after_millis(DHCP_RESTART_MS).await;
    }
}
