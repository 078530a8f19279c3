//! WiFi station management.
//!
//! - **join**: one bounded attempt with a given set of credentials
//! - **supervise**: keeps the station up after boot, with backoff
//! - **portal**: the first-boot provisioning access point and its DHCP
//!   server

pub mod portal;

use defmt::{info, warn, Debug2Format};
use embassy_net::Stack;
use embassy_time::{Duration, Timer, WithTimeout};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use knobby::config::{WIFI_CONNECT_TIMEOUT_MS, WIFI_PASSWORD, WIFI_POLL_INTERVAL_MS, WIFI_SSID};
use knobby::net::http::Credentials;
use knobby::retry::{backoff_ms, poll_until};
use knobby::Error;

use crate::clock::EmbassyClock;

/// DHCP lease budget after association.
const DHCP_TIMEOUT_MS: u64 = 15_000;

/// Link check period while connected.
const LINK_POLL_INTERVAL_MS: u64 = 500;

/// Build-time credentials, if any were configured.
pub fn builtin_credentials() -> Option<Credentials> {
    let ssid = WIFI_SSID?;
    match Credentials::new(ssid, WIFI_PASSWORD) {
        Ok(creds) => Some(creds),
        Err(_) => {
            warn!("built-in WiFi credentials too long, ignored");
            None
        }
    }
}

pub(crate) fn client_config(creds: &Credentials) -> ClientConfig {
    ClientConfig::default()
        .with_ssid(creds.ssid.as_str().into())
        .with_password(creds.pass.as_str().into())
}

/// Associate as a station with `creds`, polling the link until it is up
/// or the connect timeout runs out.
pub async fn join(controller: &mut WifiController<'static>, creds: &Credentials) -> Result<(), Error> {
    info!("joining {}", creds.ssid.as_str());
    controller
        .set_config(&ModeConfig::Client(client_config(creds)))
        .map_err(|_| Error::NotConnected)?;
    if !controller.is_started().unwrap_or(false) {
        controller
            .start_async()
            .await
            .map_err(|_| Error::NotConnected)?;
    }
    controller.connect().map_err(|_| Error::NotConnected)?;

    let mut clock = EmbassyClock;
    let joined = poll_until(
        &mut clock,
        WIFI_CONNECT_TIMEOUT_MS,
        WIFI_POLL_INTERVAL_MS,
        || matches!(controller.is_connected(), Ok(true)),
    )
    .await;

    if joined.is_err() {
        warn!("could not join {} within {} ms", creds.ssid.as_str(), WIFI_CONNECT_TIMEOUT_MS);
        let _ = controller.disconnect();
    }
    joined
}

/// Keep the station associated and leased, forever.
///
/// Expects the controller to be configured for the right network already.
pub async fn supervise(controller: &mut WifiController<'static>, stack: Stack<'_>) -> ! {
    let mut failures = 0u32;

    loop {
        if !matches!(controller.is_connected(), Ok(true)) {
            if let Err(e) = controller.connect_async().await {
                warn!("wifi connect failed: {:?}", Debug2Format(&e));
                wait_before_retry(&mut failures).await;
                continue;
            }
        }

        if stack
            .wait_config_up()
            .with_timeout(Duration::from_millis(DHCP_TIMEOUT_MS))
            .await
            .is_err()
        {
            warn!("dhcp timeout; forcing reconnect");
            let _ = controller.disconnect_async().await;
            wait_before_retry(&mut failures).await;
            continue;
        }

        if let Some(config) = stack.config_v4() {
            info!("wifi up, address {}", Debug2Format(&config.address));
        }
        failures = 0;

        while stack.is_link_up()
            && stack.config_v4().is_some()
            && matches!(controller.is_connected(), Ok(true))
        {
            Timer::after_millis(LINK_POLL_INTERVAL_MS).await;
        }

        warn!("wifi link lost; reconnecting");
        let _ = controller.disconnect_async().await;
        wait_before_retry(&mut failures).await;
    }
}

async fn wait_before_retry(failures: &mut u32) {
    let delay = backoff_ms(*failures);
    *failures = failures.saturating_add(1);
    info!("wifi retrying in {} ms (consecutive failures: {})", delay, *failures);
    Timer::after_millis(delay).await;
}
