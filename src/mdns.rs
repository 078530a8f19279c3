//! `knobcontroller.local` over mDNS.
//!
//! Listens on the mDNS group and answers A queries for our hostname with
//! the station address.  Everything else on the group is ignored.

use core::net::Ipv4Addr;

use defmt::{debug, info, warn, Debug2Format};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::Timer;
use knobby::config::{MDNS_HOSTNAME, MDNS_TTL_SECS};
use knobby::net::mdns::{self, MAX_PACKET_LEN, MDNS_GROUP, MDNS_PORT};

/// Pause before retrying a failed bind.
const BIND_RETRY_MS: u64 = 1_000;

pub async fn run(stack: Stack<'_>) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; 2 * MAX_PACKET_LEN];
    let mut tx_meta = [PacketMetadata::EMPTY; 2];
    let mut tx_buffer = [0u8; MAX_PACKET_LEN];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );

    stack.wait_config_up().await;
    if let Err(e) = stack.join_multicast_group(Ipv4Addr::from(MDNS_GROUP)) {
        warn!("mdns group join failed: {:?}", Debug2Format(&e));
    }
    while let Err(e) = socket.bind(MDNS_PORT) {
        warn!("mdns bind failed: {:?}", Debug2Format(&e));
        Timer::after_millis(BIND_RETRY_MS).await;
    }
    info!("mdns responder up: {}.local", MDNS_HOSTNAME);

    let mut query = [0u8; MAX_PACKET_LEN];
    let mut answer = [0u8; MAX_PACKET_LEN];
    loop {
        let len = match socket.recv_from(&mut query).await {
            Ok((len, _)) => len,
            // Oversized packets are not plain queries.
            Err(_) => continue,
        };
        if !mdns::asks_for(&query[..len], MDNS_HOSTNAME) {
            continue;
        }
        let Some(config) = stack.config_v4() else {
            continue;
        };

        let addr = config.address.address().octets();
        let Ok(len) = mdns::build_answer(&mut answer, MDNS_HOSTNAME, addr, MDNS_TTL_SECS) else {
            continue;
        };
        debug!("mdns query answered");
        if let Err(e) = socket
            .send_to(&answer[..len], (Ipv4Addr::from(MDNS_GROUP), MDNS_PORT))
            .await
        {
            warn!("mdns answer not sent: {:?}", Debug2Format(&e));
        }
    }
}
