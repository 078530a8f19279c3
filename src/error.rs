//! Unified error type for knobby.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Network
    /// No station link / IPv4 configuration.
    NotConnected,

    /// Operation did not finish before its deadline.
    Timeout,

    /// Server answered with a status other than 200.
    HttpStatus(u16),

    /// Socket, DNS or HTTP framing failure.
    Transport,

    /// Response body was not the JSON shape we expect.
    MalformedResponse,

    /// Incoming request could not be parsed.
    BadRequest,

    // Firmware
    /// The platform refused or failed to apply a firmware image.
    Apply(ApplyError),

    /// Version string does not fit the persisted record.
    VersionTooLong,

    // Storage
    /// Flash read/write/erase failed.
    Storage,

    /// Stored record is blank or not one we wrote.
    NotFound,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Why an image could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApplyError {
    /// No inactive slot / partition table unreadable.
    NoTargetSlot,
    /// Image larger than the target slot.
    ImageTooLarge,
    /// Writing a chunk failed.
    WriteFailed,
    /// Marking the new slot bootable failed.
    ActivateFailed,
    /// Server sent zero bytes where an image was expected.
    EmptyImage,
}

// Convenience conversions

impl From<ApplyError> for Error {
    fn from(e: ApplyError) -> Self {
        Error::Apply(e)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotConnected => f.write_str("not connected"),
            Error::Timeout => f.write_str("timed out"),
            Error::HttpStatus(status) => write!(f, "HTTP {status}"),
            Error::Transport => f.write_str("transport error"),
            Error::MalformedResponse => f.write_str("malformed response"),
            Error::BadRequest => f.write_str("bad request"),
            Error::Apply(e) => write!(f, "apply failed: {e}"),
            Error::VersionTooLong => f.write_str("version too long"),
            Error::Storage => f.write_str("flash error"),
            Error::NotFound => f.write_str("no stored record"),
            Error::BufferOverflow => f.write_str("buffer too small"),
        }
    }
}

impl core::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ApplyError::NoTargetSlot => "no target slot",
            ApplyError::ImageTooLarge => "image too large",
            ApplyError::WriteFailed => "write failed",
            ApplyError::ActivateFailed => "activation failed",
            ApplyError::EmptyImage => "empty image",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    fn render(e: Error) -> heapless::String<64> {
        let mut out = heapless::String::new();
        write!(out, "{e}").unwrap();
        out
    }

    #[test]
    fn display_is_short_and_specific() {
        assert_eq!(render(Error::HttpStatus(503)), "HTTP 503");
        assert_eq!(render(Error::Timeout), "timed out");
        assert_eq!(
            render(ApplyError::ImageTooLarge.into()),
            "apply failed: image too large"
        );
    }
}
