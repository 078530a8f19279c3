//! On-device HTTP endpoints.
//!
//! One connection at a time, `Connection: close`.  The station side only
//! serves `GET /api/restart`; the portal reuses [`read_route`] and
//! [`respond`] on the access-point stack.

use defmt::{info, warn};
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use embedded_io_async::Write;
use knobby::config::HTTP_PORT;
use knobby::net::http::{parse_request, response_head, Route, RESTART_RESPONSE};
use knobby::Error;

/// Socket buffer sizes.
const SOCKET_BUFFER: usize = 1024;

/// Largest request we accept, headers and form body included.
pub const REQUEST_BUFFER: usize = 1024;

/// Idle limit for a client connection.
const CLIENT_TIMEOUT_SECS: u64 = 10;

/// Raised by `/api/restart`; the main loop performs the reset.
pub static RESTART_REQUESTED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Serve the station-side endpoints forever.
pub async fn serve(stack: Stack<'_>) -> ! {
    let mut rx = [0u8; SOCKET_BUFFER];
    let mut tx = [0u8; SOCKET_BUFFER];
    let mut request = [0u8; REQUEST_BUFFER];

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx, &mut tx);
        socket.set_timeout(Some(Duration::from_secs(CLIENT_TIMEOUT_SECS)));
        if socket.accept(HTTP_PORT).await.is_err() {
            continue;
        }

        let result = match read_route(&mut socket, &mut request).await {
            Ok(Route::Restart) => {
                info!("restart requested over HTTP");
                let sent = respond(&mut socket, 200, "application/json", RESTART_RESPONSE.as_bytes()).await;
                RESTART_REQUESTED.signal(());
                sent
            }
            Ok(_) => respond(&mut socket, 404, "text/plain", b"not found").await,
            Err(Error::Transport) => Err(Error::Transport),
            Err(_) => respond(&mut socket, 400, "text/plain", b"bad request").await,
        };
        if let Err(e) = result {
            warn!("http client dropped: {}", e);
        }

        socket.close();
        let _ = socket.flush().await;
    }
}

/// Read from `socket` until `buf` holds one complete request.
pub async fn read_route(socket: &mut TcpSocket<'_>, buf: &mut [u8]) -> Result<Route, Error> {
    let mut len = 0;
    loop {
        if len == buf.len() {
            return Err(Error::BufferOverflow);
        }
        let n = socket
            .read(&mut buf[len..])
            .await
            .map_err(|_| Error::Transport)?;
        if n == 0 {
            return Err(Error::Transport);
        }
        len += n;
        if let Some(route) = parse_request(&buf[..len])? {
            return Ok(route);
        }
    }
}

/// Send a complete response.
pub async fn respond(
    socket: &mut TcpSocket<'_>,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<(), Error> {
    let head = response_head(status, content_type, body.len())?;
    socket
        .write_all(head.as_bytes())
        .await
        .map_err(|_| Error::Transport)?;
    socket.write_all(body).await.map_err(|_| Error::Transport)?;
    socket.flush().await.map_err(|_| Error::Transport)
}
