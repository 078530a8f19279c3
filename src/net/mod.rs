//! Update-server addressing and response parsing.
//!
//! Every request is keyed by the device's station MAC, rendered as
//! upper-case hex with the colons already percent-encoded so it can be
//! dropped straight into a query string.

pub mod credentials;
pub mod http;
pub mod mdns;
pub mod sntp;

pub use credentials::CredentialStore;
pub use http::Credentials;

use core::fmt::Write;

use heapless::String;
use serde::Deserialize;

use crate::config::{SERVER_BASE_URL, VERSION_MAX_LEN};
use crate::error::Error;
use crate::firmware::store::VersionString;

/// Longest request URL we build.
pub const URL_CAPACITY: usize = 192;

pub type Url = String<URL_CAPACITY>;

/// Hardware identifier used as the `macAddress` query value.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(String<32>);

impl DeviceId {
    /// `AA%3ABB%3ACC%3ADD%3AEE%3AFF`
    pub fn from_mac(mac: [u8; 6]) -> Self {
        let mut id = String::new();
        for (i, byte) in mac.iter().enumerate() {
            if i > 0 {
                let _ = id.push_str("%3A");
            }
            let _ = write!(id, "{byte:02X}");
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `<base><path>?macAddress=<id>`
pub fn endpoint_url(base: &str, path: &str, id: &DeviceId) -> Result<Url, Error> {
    let mut url = Url::new();
    write!(url, "{base}{path}?macAddress={}", id.as_str()).map_err(|_| Error::BufferOverflow)?;
    Ok(url)
}

/// [`endpoint_url`] against the configured server.
pub fn server_url(path: &str, id: &DeviceId) -> Result<Url, Error> {
    endpoint_url(SERVER_BASE_URL, path, id)
}

/// `<base><path>` with no query, for the log sink.
pub fn plain_url(base: &str, path: &str) -> Result<Url, Error> {
    let mut url = Url::new();
    write!(url, "{base}{path}").map_err(|_| Error::BufferOverflow)?;
    Ok(url)
}

#[derive(Deserialize)]
struct VersionResponse<'a> {
    #[serde(borrow)]
    data: &'a str,
}

/// Extract the latest version from a version-check body,
/// `{"data":"1.2.0", ...}`.
pub fn parse_version_response(body: &[u8]) -> Result<VersionString, Error> {
    let (response, _) = serde_json_core::from_slice::<VersionResponse<'_>>(body)
        .map_err(|_| Error::MalformedResponse)?;

    let text = response.data.trim();
    if text.is_empty() || text.len() > VERSION_MAX_LEN {
        return Err(Error::MalformedResponse);
    }
    let mut version = VersionString::new();
    version
        .push_str(text)
        .map_err(|_| Error::MalformedResponse)?;
    Ok(version)
}
