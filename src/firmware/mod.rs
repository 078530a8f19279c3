//! Firmware versioning, persistence and self-update.
//!
//! ## Components
//!
//! - **version**: `major.minor.patch` parsing and ordering
//! - **store**: the persisted version record in flash
//! - **update**: the check / download / activate protocol
//! - **schedule**: when checks run

pub mod schedule;
pub mod store;
pub mod update;
pub mod version;

#[cfg(test)]
pub(crate) mod mem_flash;

pub use schedule::UpdateSchedule;
pub use store::{LoadedVersion, VersionStore, VersionString};
pub use update::{
    FetchOutcome, FirmwareSink, UpdateManager, UpdateOutcome, UpdateTarget, UpdateTransport,
};
pub use version::{is_newer, FirmwareVersion};
