//! HTTP client side: the update transport and the remote log sink.
//!
//! Both go through reqwless over the station stack.  Every request is
//! bounded by an embassy timeout; the connection is closed after each one.

use defmt::{debug, warn};
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::Stack;
use embassy_time::{Duration, WithTimeout};
use embedded_io_async::Read;
use knobby::config::{
    FIRMWARE_DOWNLOAD_TIMEOUT_MS, LOG_PATH, LOG_POST_TIMEOUT_MS, REMOTE_LOGGING, SERVER_BASE_URL,
    VERSION_CHECK_TIMEOUT_MS,
};
use knobby::firmware::{FetchOutcome, FirmwareSink, UpdateTransport};
use knobby::net::plain_url;
use knobby::Error;
use reqwless::client::HttpClient;
use reqwless::headers::ContentType;
use reqwless::request::{Method, RequestBuilder};

/// Concurrent sockets in the client pool.
pub const CLIENT_SOCKETS: usize = 1;
/// Per-socket TCP buffer.
pub const CLIENT_BUFFER: usize = 1536;

pub type ClientState = TcpClientState<CLIENT_SOCKETS, CLIENT_BUFFER, CLIENT_BUFFER>;

/// Response headers plus the buffered part of the body.
const RESPONSE_BUFFER: usize = 2048;

/// Firmware copy granularity.
const CHUNK: usize = 1024;

pub struct HttpTransport<'a> {
    stack: Stack<'a>,
    tcp: TcpClient<'a, CLIENT_SOCKETS, CLIENT_BUFFER, CLIENT_BUFFER>,
    dns: DnsSocket<'a>,
    rx: [u8; RESPONSE_BUFFER],
}

impl<'a> HttpTransport<'a> {
    pub fn new(stack: Stack<'a>, state: &'a ClientState) -> Self {
        Self {
            stack,
            tcp: TcpClient::new(stack, state),
            dns: DnsSocket::new(stack),
            rx: [0; RESPONSE_BUFFER],
        }
    }

    /// POST one line to the log endpoint when remote logging is on.
    /// Failures only reach the console.
    pub async fn remote_log(&mut self, line: &str) {
        if !REMOTE_LOGGING || !self.is_connected() {
            return;
        }
        let url = match plain_url(SERVER_BASE_URL, LOG_PATH) {
            Ok(url) => url,
            Err(e) => {
                warn!("log url: {}", e);
                return;
            }
        };
        let posted = self
            .post_text(&url, line.as_bytes())
            .with_timeout(Duration::from_millis(LOG_POST_TIMEOUT_MS))
            .await
            .unwrap_or(Err(Error::Timeout));
        if let Err(e) = posted {
            warn!("remote log not delivered: {}", e);
        }
    }

    async fn post_text(&mut self, url: &str, body: &[u8]) -> Result<(), Error> {
        let mut client = HttpClient::new(&self.tcp, &self.dns);
        let mut request = client
            .request(Method::POST, url)
            .await
            .map_err(|_| Error::Transport)?
            .body(body)
            .content_type(ContentType::TextPlain);
        let response = request.send(&mut self.rx).await.map_err(|_| Error::Transport)?;
        match response.status.0 {
            200 => Ok(()),
            status => Err(Error::HttpStatus(status)),
        }
    }

    async fn get_inner(&mut self, url: &str, body: &mut [u8]) -> Result<usize, Error> {
        let mut client = HttpClient::new(&self.tcp, &self.dns);
        let mut request = client
            .request(Method::GET, url)
            .await
            .map_err(|_| Error::Transport)?;
        let response = request.send(&mut self.rx).await.map_err(|_| Error::Transport)?;
        let status = response.status.0;
        if status != 200 {
            return Err(Error::HttpStatus(status));
        }
        let bytes = response
            .body()
            .read_to_end()
            .await
            .map_err(|_| Error::Transport)?;
        let out = body.get_mut(..bytes.len()).ok_or(Error::BufferOverflow)?;
        out.copy_from_slice(bytes);
        Ok(bytes.len())
    }

    async fn fetch_inner<S: FirmwareSink>(&mut self, url: &str, sink: &mut S) -> Result<FetchOutcome, Error> {
        let mut client = HttpClient::new(&self.tcp, &self.dns);
        let mut request = client
            .request(Method::GET, url)
            .await
            .map_err(|_| Error::Transport)?;
        let response = request.send(&mut self.rx).await.map_err(|_| Error::Transport)?;
        match response.status.0 {
            200 => {}
            304 => return Ok(FetchOutcome::NoUpdate),
            status => return Err(Error::HttpStatus(status)),
        }

        let announced = response.content_length.map(|len| len as u32);
        sink.begin(announced).await?;

        let mut reader = response.body().reader();
        let mut chunk = [0u8; CHUNK];
        let mut bytes: u32 = 0;
        loop {
            let n = reader.read(&mut chunk).await.map_err(|_| Error::Transport)?;
            if n == 0 {
                break;
            }
            sink.write_chunk(&chunk[..n]).await?;
            bytes += n as u32;
        }
        debug!("firmware body complete ({} bytes)", bytes);

        if announced.is_some_and(|len| len != bytes) {
            return Err(Error::Transport);
        }
        Ok(FetchOutcome::Complete { bytes })
    }
}

impl UpdateTransport for HttpTransport<'_> {
    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }

    async fn get(&mut self, url: &str, body: &mut [u8]) -> Result<usize, Error> {
        self.get_inner(url, body)
            .with_timeout(Duration::from_millis(VERSION_CHECK_TIMEOUT_MS))
            .await
            .unwrap_or(Err(Error::Timeout))
    }

    async fn fetch_firmware<S: FirmwareSink>(
        &mut self,
        url: &str,
        sink: &mut S,
    ) -> Result<FetchOutcome, Error> {
        self.fetch_inner(url, sink)
            .with_timeout(Duration::from_millis(FIRMWARE_DOWNLOAD_TIMEOUT_MS))
            .await
            .unwrap_or(Err(Error::Timeout))
    }
}
