//! Dotted `major.minor.patch` firmware versions.

use core::cmp::Ordering;
use core::fmt;

/// A firmware version triple, ordered component by component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a dotted version string.
    ///
    /// Parsing never fails: a missing or non-numeric component reads as 0
    /// and anything after the third component is ignored.  A component
    /// with trailing garbage keeps its leading digits (`"2-rc1"` is 2).
    pub fn parse(text: &str) -> Self {
        let mut parts = text.trim().split('.').map(component);
        let major = parts.next().unwrap_or(0);
        let minor = parts.next().unwrap_or(0);
        let patch = parts.next().unwrap_or(0);
        Self::new(major, minor, patch)
    }

    /// `true` iff `self` sorts strictly after `other`.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self > other
    }
}

fn component(text: &str) -> u32 {
    text.trim()
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, digit| {
            acc.saturating_mul(10).saturating_add(u32::from(digit - b'0'))
        })
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Whether the version string `latest` is newer than `current`.
pub fn is_newer(latest: &str, current: &str) -> bool {
    FirmwareVersion::parse(latest).is_newer_than(&FirmwareVersion::parse(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_plain_triples() {
        assert_eq!(FirmwareVersion::parse("1.2.3"), FirmwareVersion::new(1, 2, 3));
        assert_eq!(FirmwareVersion::parse(" 10.0.42 "), FirmwareVersion::new(10, 0, 42));
    }

    #[test]
    fn malformed_components_read_as_zero() {
        assert_eq!(FirmwareVersion::parse(""), FirmwareVersion::new(0, 0, 0));
        assert_eq!(FirmwareVersion::parse("1"), FirmwareVersion::new(1, 0, 0));
        assert_eq!(FirmwareVersion::parse("1.x.3"), FirmwareVersion::new(1, 0, 3));
        assert_eq!(FirmwareVersion::parse("1.2.3-beta"), FirmwareVersion::new(1, 2, 3));
        assert_eq!(FirmwareVersion::parse("1.2.3.4"), FirmwareVersion::new(1, 2, 3));
        assert_eq!(FirmwareVersion::parse("a.b.c"), FirmwareVersion::new(0, 0, 0));
    }

    #[test]
    fn huge_component_saturates() {
        let v = FirmwareVersion::parse("99999999999.1.0");
        assert_eq!(v.major, u32::MAX);
    }

    #[test]
    fn first_difference_decides() {
        assert!(is_newer("2.0.0", "1.9.9"));
        assert!(is_newer("1.10.0", "1.9.0"));
        assert!(is_newer("1.2.1", "1.2.0"));
        assert!(!is_newer("1.2.0", "1.2.0"));
        assert!(!is_newer("0.9.9", "1.0.0"));
    }

    #[test]
    fn display_round_trips_canonical_form() {
        let v = FirmwareVersion::new(1, 20, 3);
        let mut s: heapless::String<16> = heapless::String::new();
        core::fmt::write(&mut s, format_args!("{v}")).unwrap();
        assert_eq!(s.as_str(), "1.20.3");
        assert_eq!(FirmwareVersion::parse(&s), v);
    }

    fn version() -> impl Strategy<Value = FirmwareVersion> {
        (0u32..20, 0u32..20, 0u32..20).prop_map(|(a, b, c)| FirmwareVersion::new(a, b, c))
    }

    proptest! {
        #[test]
        fn never_newer_than_itself(v in version()) {
            prop_assert!(!v.is_newer_than(&v));
        }

        #[test]
        fn newer_is_transitive(a in version(), b in version(), c in version()) {
            if a.is_newer_than(&b) && b.is_newer_than(&c) {
                prop_assert!(a.is_newer_than(&c));
            }
        }

        #[test]
        fn exactly_one_of_newer_older_equal(a in version(), b in version()) {
            let count = [a.is_newer_than(&b), b.is_newer_than(&a), a == b]
                .iter()
                .filter(|x| **x)
                .count();
            prop_assert_eq!(count, 1);
        }

        #[test]
        fn parse_never_panics(s in "\\PC{0,40}") {
            let _ = FirmwareVersion::parse(&s);
        }
    }
}
