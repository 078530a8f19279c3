//! Wall-clock sync over SNTP.
//!
//! Syncs once the station has an address, then hourly.  A failed exchange
//! is retried sooner; the clock keeps running from the last good sync.

use defmt::{info, warn};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::{Duration, Timer, WithTimeout};
use knobby::config::{NTP_RESYNC_INTERVAL_MS, NTP_RETRY_MS, NTP_SERVER, NTP_TIMEOUT_MS};
use knobby::net::sntp::{self, NTP_PORT, PACKET_LEN};
use knobby::wallclock::WallClock;
use knobby::Error;

use crate::clock;

/// Read by the control loop for the standby screen.
pub static WALL_CLOCK: WallClock = WallClock::new();

pub async fn run(stack: Stack<'_>) -> ! {
    loop {
        stack.wait_config_up().await;

        let synced = fetch_unix_time(stack)
            .with_timeout(Duration::from_millis(NTP_TIMEOUT_MS))
            .await
            .unwrap_or(Err(Error::Timeout));

        match synced {
            Ok(unix_secs) => {
                WALL_CLOCK.set(unix_secs, clock::now_ms());
                info!("clock set from {}: {}", NTP_SERVER, unix_secs);
                Timer::after_millis(NTP_RESYNC_INTERVAL_MS).await;
            }
            Err(e) => {
                warn!("time sync failed: {}", e);
                Timer::after_millis(NTP_RETRY_MS).await;
            }
        }
    }
}

async fn fetch_unix_time(stack: Stack<'_>) -> Result<u64, Error> {
    let addrs = stack
        .dns_query(NTP_SERVER, DnsQueryType::A)
        .await
        .map_err(|_| Error::Transport)?;
    let server = *addrs.first().ok_or(Error::Transport)?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0u8; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0u8; 128];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| Error::Transport)?;

    socket
        .send_to(&sntp::request(), (server, NTP_PORT))
        .await
        .map_err(|_| Error::Transport)?;

    let mut response = [0u8; PACKET_LEN];
    let (len, _) = socket
        .recv_from(&mut response)
        .await
        .map_err(|_| Error::Transport)?;
    sntp::parse_response(&response[..len])
}
