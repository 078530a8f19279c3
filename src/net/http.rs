//! Minimal HTTP/1.1 request handling for the on-device endpoints.
//!
//! Only what the provisioning portal and the restart endpoint need: a
//! request line, `Content-Length`, and an urlencoded form body.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::error::Error;

/// Headers we are prepared to look at per request.
const MAX_HEADERS: usize = 16;

/// Body sent by `/api/restart` before the device resets.
pub const RESTART_RESPONSE: &str = "{\"status\":\"restarting\"}";

/// Station credentials submitted through the portal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Credentials {
    pub ssid: String<32>,
    pub pass: String<64>,
}

impl Credentials {
    pub fn new(ssid: &str, pass: &str) -> Result<Self, Error> {
        let mut creds = Self::default();
        creds.ssid.push_str(ssid).map_err(|_| Error::BufferOverflow)?;
        creds.pass.push_str(pass).map_err(|_| Error::BufferOverflow)?;
        Ok(creds)
    }
}

/// What a complete request asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    /// `GET /` - the network picker.
    PortalForm,
    /// `POST /save` with a valid form.
    PortalSave(Credentials),
    /// `GET /api/restart`.
    Restart,
    NotFound,
}

/// Parse one request from `buf`.
///
/// Returns `Ok(None)` while the headers or the announced body are still
/// incomplete.
pub fn parse_request(buf: &[u8]) -> Result<Option<Route>, Error> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    let header_len = match req.parse(buf).map_err(|_| Error::BadRequest)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let method = req.method.unwrap_or("");
    let target = req.path.unwrap_or("/");
    let path = target.split('?').next().unwrap_or(target);

    let content_length = req
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
        .map(|h| {
            core::str::from_utf8(h.value)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or(Error::BadRequest)
        })
        .transpose()?
        .unwrap_or(0);

    let body = &buf[header_len..];
    if body.len() < content_length {
        return Ok(None);
    }
    let body = &body[..content_length];

    let route = match (method, path) {
        ("GET", "/") => Route::PortalForm,
        ("GET", "/api/restart") => Route::Restart,
        ("POST", "/save") => Route::PortalSave(parse_credentials(body)?),
        _ => Route::NotFound,
    };
    Ok(Some(route))
}

/// Pull `ssid` and `pass` out of an urlencoded form.  A missing `pass`
/// means an open network; a missing or empty `ssid` is rejected.
pub fn parse_credentials(form: &[u8]) -> Result<Credentials, Error> {
    let mut creds = Credentials::default();
    let mut have_ssid = false;

    for pair in form.split(|&b| b == b'&') {
        let mut kv = pair.splitn(2, |&b| b == b'=');
        let key = kv.next().unwrap_or(&[]);
        let value = kv.next().unwrap_or(&[]);
        match key {
            b"ssid" => {
                creds.ssid = url_decode(value)?;
                have_ssid = !creds.ssid.is_empty();
            }
            b"pass" => creds.pass = url_decode(value)?,
            _ => {}
        }
    }

    if have_ssid {
        Ok(creds)
    } else {
        Err(Error::BadRequest)
    }
}

/// Decode `application/x-www-form-urlencoded` text.
pub fn url_decode<const N: usize>(input: &[u8]) -> Result<String<N>, Error> {
    let mut bytes: Vec<u8, N> = Vec::new();
    let mut i = 0;
    while i < input.len() {
        let byte = match input[i] {
            b'+' => b' ',
            b'%' => {
                let hi = input.get(i + 1).and_then(|&c| hex_val(c));
                let lo = input.get(i + 2).and_then(|&c| hex_val(c));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        i += 2;
                        (hi << 4) | lo
                    }
                    _ => return Err(Error::BadRequest),
                }
            }
            other => other,
        };
        bytes.push(byte).map_err(|_| Error::BufferOverflow)?;
        i += 1;
    }
    String::from_utf8(bytes).map_err(|_| Error::BadRequest)
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

/// Status line and headers for a `Connection: close` response.
pub fn response_head(status: u16, content_type: &str, body_len: usize) -> Result<String<160>, Error> {
    let mut head = String::new();
    write!(
        head,
        "HTTP/1.1 {status} {}\r\nContent-Type: {content_type}\r\nContent-Length: {body_len}\r\nConnection: close\r\n\r\n",
        reason(status)
    )
    .map_err(|_| Error::BufferOverflow)?;
    Ok(head)
}

/// Write the network picker page.  SSIDs are HTML-escaped.
pub fn write_portal_page<W: Write>(out: &mut W, networks: &[&str]) -> core::fmt::Result {
    out.write_str(
        "<!DOCTYPE html><html><head><meta name=\"viewport\" content=\"width=device-width\">\
         <title>Knobby setup</title></head><body><h2>Knobby WiFi setup</h2>\
         <form method=\"POST\" action=\"/save\"><select name=\"ssid\">",
    )?;
    for ssid in networks {
        out.write_str("<option>")?;
        write_escaped(out, ssid)?;
        out.write_str("</option>")?;
    }
    out.write_str(
        "</select><br><input name=\"pass\" type=\"password\" placeholder=\"Password\">\
         <br><button type=\"submit\">Connect</button></form></body></html>",
    )
}

fn write_escaped<W: Write>(out: &mut W, text: &str) -> core::fmt::Result {
    for c in text.chars() {
        match c {
            '<' => out.write_str("&lt;")?,
            '>' => out.write_str("&gt;")?,
            '&' => out.write_str("&amp;")?,
            '"' => out.write_str("&quot;")?,
            _ => out.write_char(c)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_get_requests() {
        let root = parse_request(b"GET / HTTP/1.1\r\nHost: 10.10.10.10\r\n\r\n").unwrap();
        assert_eq!(root, Some(Route::PortalForm));

        let restart = parse_request(b"GET /api/restart?now=1 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(restart, Some(Route::Restart));

        let other = parse_request(b"GET /favicon.ico HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(other, Some(Route::NotFound));
    }

    #[test]
    fn partial_headers_need_more() {
        assert_eq!(parse_request(b"GET / HTTP/1.1\r\nHost: x"), Ok(None));
    }

    #[test]
    fn waits_for_full_body() {
        let req = b"POST /save HTTP/1.1\r\nContent-Length: 20\r\n\r\nssid=home";
        assert_eq!(parse_request(req), Ok(None));
    }

    #[test]
    fn save_decodes_credentials() {
        let req = b"POST /save HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\ncontent-length: 28\r\n\r\nssid=My+Home%21&pass=p%40ss1";
        let expected = Credentials::new("My Home!", "p@ss1").unwrap();
        assert_eq!(parse_request(req), Ok(Some(Route::PortalSave(expected))));
    }

    #[test]
    fn save_without_ssid_is_bad_request() {
        let req = b"POST /save HTTP/1.1\r\nContent-Length: 9\r\n\r\npass=abcd";
        assert_eq!(parse_request(req), Err(Error::BadRequest));
        assert_eq!(parse_credentials(b"ssid=&pass=x"), Err(Error::BadRequest));
    }

    #[test]
    fn open_network_has_empty_pass() {
        let creds = parse_credentials(b"ssid=cafe").unwrap();
        assert_eq!(creds.ssid.as_str(), "cafe");
        assert!(creds.pass.is_empty());
    }

    #[test]
    fn garbage_is_bad_request() {
        assert_eq!(parse_request(b"\x00\x01\x02 nonsense\r\n\r\n"), Err(Error::BadRequest));
        let bad_len = b"POST /save HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        assert_eq!(parse_request(bad_len), Err(Error::BadRequest));
    }

    #[test]
    fn url_decode_rules() {
        assert_eq!(url_decode::<16>(b"a+b%20c").unwrap().as_str(), "a b c");
        assert_eq!(url_decode::<16>(b"%C3%A9").unwrap().as_str(), "é");
        assert_eq!(url_decode::<16>(b"bad%2"), Err(Error::BadRequest));
        assert_eq!(url_decode::<16>(b"%zz"), Err(Error::BadRequest));
        assert_eq!(url_decode::<16>(b"%FF"), Err(Error::BadRequest));
        assert_eq!(url_decode::<2>(b"abc"), Err(Error::BufferOverflow));
    }

    #[test]
    fn head_has_length_and_close() {
        let head = response_head(200, "application/json", RESTART_RESPONSE.len()).unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 23\r\n"));
        assert!(head.ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn portal_page_lists_escaped_networks() {
        let mut page: String<1024> = String::new();
        write_portal_page(&mut page, &["home", "<evil>"]).unwrap();
        assert!(page.contains("<option>home</option>"));
        assert!(page.contains("<option>&lt;evil&gt;</option>"));
        assert!(page.contains("action=\"/save\""));
    }
}
