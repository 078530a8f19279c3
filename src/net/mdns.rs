//! Minimal mDNS responder packets (RFC 6762).
//!
//! Answers one question only: the IPv4 address of `<host>.local`.  No
//! probing, no announcements, no service records.

use crate::error::Error;

pub const MDNS_PORT: u16 = 5353;

/// IPv4 multicast group every query and answer goes to.
pub const MDNS_GROUP: [u8; 4] = [224, 0, 0, 251];

/// Longest packet worth reading; anything bigger is not a plain query.
pub const MAX_PACKET_LEN: usize = 512;

const HEADER_LEN: usize = 12;
const FLAG_RESPONSE: u16 = 0x8000;
const OPCODE_MASK: u16 = 0x7800;
const FLAGS_AUTHORITATIVE_ANSWER: u16 = 0x8400;

const TYPE_A: u16 = 1;
const TYPE_ANY: u16 = 255;
const CLASS_IN: u16 = 1;
const CLASS_ANY: u16 = 255;
/// Unicast-response bit on questions, cache-flush bit on answers.
const CLASS_TOP_BIT: u16 = 0x8000;

/// Compression pointers followed before a name is given up on.
const MAX_POINTER_HOPS: usize = 8;

const LOCAL: &str = "local";

/// Whether `packet` is a query with a question for the A record of
/// `<host>.local`.  Names compare case-insensitively.
pub fn asks_for(packet: &[u8], host: &str) -> bool {
    query_matches(packet, host).unwrap_or(false)
}

fn query_matches(packet: &[u8], host: &str) -> Option<bool> {
    let header = packet.get(..HEADER_LEN)?;
    let flags = be16(header[2], header[3]);
    if flags & (FLAG_RESPONSE | OPCODE_MASK) != 0 {
        return Some(false);
    }

    let questions = be16(header[4], header[5]);
    let expected = [host, LOCAL];
    let mut at = HEADER_LEN;
    for _ in 0..questions {
        let (name_matches, end) = read_name(packet, at, &expected)?;
        let fields = packet.get(end..end + 4)?;
        let qtype = be16(fields[0], fields[1]);
        let qclass = be16(fields[2], fields[3]) & !CLASS_TOP_BIT;
        if name_matches
            && matches!(qtype, TYPE_A | TYPE_ANY)
            && matches!(qclass, CLASS_IN | CLASS_ANY)
        {
            return Some(true);
        }
        at = end + 4;
    }
    Some(false)
}

/// Walk the name starting at `at`, following compression pointers.
///
/// Returns whether its labels equal `expected` and the offset just past
/// the name as it sits at `at`.
fn read_name(packet: &[u8], mut at: usize, expected: &[&str]) -> Option<(bool, usize)> {
    let mut end = None;
    let mut hops = 0;
    let mut index = 0;
    let mut matches = true;
    loop {
        let len = *packet.get(at)? as usize;
        if len & 0xC0 == 0xC0 {
            let low = *packet.get(at + 1)? as usize;
            if end.is_none() {
                end = Some(at + 2);
            }
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return None;
            }
            at = ((len & 0x3F) << 8) | low;
            continue;
        }
        if len & 0xC0 != 0 {
            return None;
        }
        if len == 0 {
            let end = end.unwrap_or(at + 1);
            return Some((matches && index == expected.len(), end));
        }

        let label = packet.get(at + 1..at + 1 + len)?;
        matches = matches
            && expected
                .get(index)
                .is_some_and(|e| e.as_bytes().eq_ignore_ascii_case(label));
        index += 1;
        at += 1 + len;
    }
}

/// Write an authoritative answer binding `<host>.local` to `addr` into
/// `buf`.  Returns the packet length.
pub fn build_answer(buf: &mut [u8], host: &str, addr: [u8; 4], ttl_secs: u32) -> Result<usize, Error> {
    if host.is_empty() || host.len() > 63 {
        return Err(Error::BadRequest);
    }

    let mut out = Cursor { buf, at: 0 };
    out.u16(0)?; // id
    out.u16(FLAGS_AUTHORITATIVE_ANSWER)?;
    out.u16(0)?; // questions
    out.u16(1)?; // answers
    out.u16(0)?;
    out.u16(0)?;

    for label in [host, LOCAL] {
        out.bytes(&[label.len() as u8])?;
        out.bytes(label.as_bytes())?;
    }
    out.bytes(&[0])?;

    out.u16(TYPE_A)?;
    out.u16(CLASS_TOP_BIT | CLASS_IN)?;
    out.bytes(&ttl_secs.to_be_bytes())?;
    out.u16(addr.len() as u16)?;
    out.bytes(&addr)?;
    Ok(out.at)
}

struct Cursor<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl Cursor<'_> {
    fn bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let end = self.at + bytes.len();
        self.buf
            .get_mut(self.at..end)
            .ok_or(Error::BufferOverflow)?
            .copy_from_slice(bytes);
        self.at = end;
        Ok(())
    }

    fn u16(&mut self, value: u16) -> Result<(), Error> {
        self.bytes(&value.to_be_bytes())
    }
}

fn be16(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn query(name: &[&str], qtype: u16, qclass: u16) -> Vec<u8> {
        let mut packet = std::vec![0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0];
        for label in name {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0);
        packet.extend_from_slice(&qtype.to_be_bytes());
        packet.extend_from_slice(&qclass.to_be_bytes());
        packet
    }

    #[test]
    fn a_query_for_our_name_matches() {
        let packet = query(&["knobcontroller", "local"], TYPE_A, CLASS_IN);
        assert!(asks_for(&packet, "knobcontroller"));
    }

    #[test]
    fn case_any_type_and_unicast_bit_are_accepted() {
        let packet = query(&["KnobController", "LOCAL"], TYPE_ANY, 0x8001);
        assert!(asks_for(&packet, "knobcontroller"));
    }

    #[test]
    fn other_names_and_types_are_ignored() {
        let aaaa = query(&["knobcontroller", "local"], 28, CLASS_IN);
        assert!(!asks_for(&aaaa, "knobcontroller"));

        let other = query(&["printer", "local"], TYPE_A, CLASS_IN);
        assert!(!asks_for(&other, "knobcontroller"));

        let longer = query(&["knobcontroller", "local", "x"], TYPE_A, CLASS_IN);
        assert!(!asks_for(&longer, "knobcontroller"));

        let prefix = query(&["knob", "local"], TYPE_A, CLASS_IN);
        assert!(!asks_for(&prefix, "knobcontroller"));
    }

    #[test]
    fn responses_are_never_answered() {
        let mut packet = query(&["knobcontroller", "local"], TYPE_A, CLASS_IN);
        packet[2] = 0x84;
        assert!(!asks_for(&packet, "knobcontroller"));
    }

    #[test]
    fn second_question_can_point_back_into_the_first() {
        // Q1: printer.local A, Q2: knobcontroller.<pointer to "local">
        let mut packet = query(&["printer", "local"], TYPE_A, CLASS_IN);
        packet[5] = 2;
        let local_at = HEADER_LEN + 1 + "printer".len();
        packet.push("knobcontroller".len() as u8);
        packet.extend_from_slice(b"knobcontroller");
        packet.extend_from_slice(&[0xC0, local_at as u8]);
        packet.extend_from_slice(&TYPE_A.to_be_bytes());
        packet.extend_from_slice(&CLASS_IN.to_be_bytes());
        assert!(asks_for(&packet, "knobcontroller"));
    }

    #[test]
    fn pointer_loops_and_truncation_do_not_match() {
        let mut looped = std::vec![0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0];
        looped.extend_from_slice(&[0xC0, HEADER_LEN as u8, 0, 1, 0, 1]);
        assert!(!asks_for(&looped, "knobcontroller"));

        let packet = query(&["knobcontroller", "local"], TYPE_A, CLASS_IN);
        for len in 0..packet.len() {
            assert!(!asks_for(&packet[..len], "knobcontroller"));
        }
    }

    #[test]
    fn answer_carries_one_a_record() {
        let mut buf = [0u8; 64];
        let len = build_answer(&mut buf, "knobcontroller", [192, 168, 1, 42], 120).unwrap();
        let packet = &buf[..len];

        assert_eq!(&packet[..12], &[0, 0, 0x84, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
        let name_end = 12 + 1 + 14 + 1 + 5 + 1;
        assert_eq!(packet[12], 14);
        assert_eq!(&packet[13..27], b"knobcontroller");
        assert_eq!(&packet[27..33], b"\x05local");
        assert_eq!(packet[33], 0);
        assert_eq!(
            &packet[name_end..],
            &[0, 1, 0x80, 1, 0, 0, 0, 120, 0, 4, 192, 168, 1, 42]
        );
    }

    #[test]
    fn answer_reports_a_short_buffer() {
        let mut buf = [0u8; 20];
        assert_eq!(
            build_answer(&mut buf, "knobcontroller", [10, 0, 0, 1], 120),
            Err(Error::BufferOverflow)
        );
    }
}
