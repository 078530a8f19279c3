//! SNTP client packets (RFC 4330), just enough to read the server's
//! transmit time.

use crate::error::Error;

pub const NTP_PORT: u16 = 123;

/// Request and response length without extension fields.
pub const PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 and 1970-01-01.
const NTP_TO_UNIX_OFFSET: u64 = 2_208_988_800;

/// LI = 0, VN = 3, Mode = 3 (client).
const CLIENT_HEADER: u8 = 0x1B;

const MODE_SERVER: u8 = 4;
const TRANSMIT_SECONDS_AT: usize = 40;

/// A client request.  Every field except the header byte is zero.
pub fn request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = CLIENT_HEADER;
    packet
}

/// Unix seconds from a server reply's transmit timestamp.
///
/// Rejects short packets, anything that is not a server reply, kiss-o'-death
/// (stratum 0) replies and timestamps before 1970.
pub fn parse_response(packet: &[u8]) -> Result<u64, Error> {
    if packet.len() < PACKET_LEN {
        return Err(Error::MalformedResponse);
    }
    if packet[0] & 0x07 != MODE_SERVER || packet[1] == 0 {
        return Err(Error::MalformedResponse);
    }

    let at = TRANSMIT_SECONDS_AT;
    let seconds = u32::from_be_bytes([packet[at], packet[at + 1], packet[at + 2], packet[at + 3]]);
    (seconds as u64)
        .checked_sub(NTP_TO_UNIX_OFFSET)
        .ok_or(Error::MalformedResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(ntp_seconds: u32) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];
        packet[0] = 0x1C; // VN 3, server
        packet[1] = 2;
        packet[40..44].copy_from_slice(&ntp_seconds.to_be_bytes());
        packet
    }

    #[test]
    fn request_is_a_version_3_client_packet() {
        let packet = request();
        assert_eq!(packet[0], 0x1B);
        assert!(packet[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn transmit_time_is_shifted_to_the_unix_epoch() {
        let unix = 1_740_000_000u64;
        let packet = reply((unix + NTP_TO_UNIX_OFFSET) as u32);
        assert_eq!(parse_response(&packet), Ok(unix));
    }

    #[test]
    fn short_or_foreign_packets_are_rejected() {
        let good = reply(3_948_988_800);
        assert_eq!(parse_response(&good[..47]), Err(Error::MalformedResponse));

        // Our own request echoed back.
        assert_eq!(parse_response(&request()), Err(Error::MalformedResponse));

        let mut kiss = good;
        kiss[1] = 0;
        assert_eq!(parse_response(&kiss), Err(Error::MalformedResponse));
    }

    #[test]
    fn timestamp_before_1970_is_rejected() {
        let packet = reply(1_000);
        assert_eq!(parse_response(&packet), Err(Error::MalformedResponse));
    }
}
