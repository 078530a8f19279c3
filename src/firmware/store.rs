//! Persisted firmware version.
//!
//! A dedicated flash sector holds one record at a fixed offset: the version
//! string, a NUL terminator, and erased (0xFF) padding.  Reads stop at the
//! first NUL, the first 0xFF, or after [`VERSION_MAX_LEN`] bytes.
//!
//! Storage layout (relative to the sector base):
//! ```text
//! 0x00 .. 0x3F   unused (erased)
//! 0x40 .. 0x5F   version record, 32 bytes
//! ```

use embedded_storage_async::nor_flash::NorFlash;
use heapless::String;

use crate::config::{
    DEFAULT_VERSION, VERSION_MAX_LEN, VERSION_MAX_PLAUSIBLE_LEN, VERSION_RECORD_OFFSET,
    VERSION_STORE_FLASH_OFFSET,
};
use crate::error::Error;

use super::version::is_newer;

/// Bytes reserved for the record: the string plus its terminator.
pub const RECORD_SIZE: usize = VERSION_MAX_LEN + 1;

const ERASED: u8 = 0xFF;

/// Version string as stored.
pub type VersionString = String<VERSION_MAX_LEN>;

/// Result of the boot-time load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedVersion {
    pub version: VersionString,
    /// Storage was blank or corrupt and the default was written back.
    pub healed: bool,
    /// The record was older than the running build and was raised to it.
    pub raised: bool,
}

/// Whether a stored string looks like a version we wrote.
pub fn is_plausible(stored: &str) -> bool {
    !stored.is_empty() && stored.contains('.') && stored.len() <= VERSION_MAX_PLAUSIBLE_LEN
}

/// Fixed-offset version record in a dedicated flash sector.
///
/// The flash is passed to every call so the same device can be shared with
/// the OTA writer.
#[derive(Clone, Copy, Debug)]
pub struct VersionStore {
    base: u32,
}

impl VersionStore {
    pub const fn new(base: u32) -> Self {
        Self { base }
    }

    fn record_offset(&self) -> u32 {
        self.base + VERSION_RECORD_OFFSET
    }

    /// Read the stored string; blank storage yields an empty string.
    pub async fn read<F: NorFlash>(&self, flash: &mut F) -> Result<VersionString, Error> {
        let mut raw = [0u8; RECORD_SIZE];
        flash
            .read(self.record_offset(), &mut raw)
            .await
            .map_err(|_| Error::Storage)?;

        let len = raw
            .iter()
            .take(VERSION_MAX_LEN)
            .position(|&b| b == 0 || b == ERASED)
            .unwrap_or(VERSION_MAX_LEN);

        let mut version = VersionString::new();
        // Undecodable bytes count as blank.
        if let Ok(text) = core::str::from_utf8(&raw[..len]) {
            let _ = version.push_str(text);
        }
        Ok(version)
    }

    /// Replace the stored string.  Erases the sector first.
    pub async fn write<F: NorFlash>(&self, flash: &mut F, version: &str) -> Result<(), Error> {
        if version.len() > VERSION_MAX_LEN {
            return Err(Error::VersionTooLong);
        }

        let mut record = [ERASED; RECORD_SIZE];
        record[..version.len()].copy_from_slice(version.as_bytes());
        record[version.len()] = 0;

        flash
            .erase(self.base, self.base + F::ERASE_SIZE as u32)
            .await
            .map_err(|_| Error::Storage)?;
        flash
            .write(self.record_offset(), &record)
            .await
            .map_err(|_| Error::Storage)?;
        debug!("version record written");
        Ok(())
    }

    /// Boot-time load with self-healing.
    ///
    /// A blank or implausible record is replaced by [`DEFAULT_VERSION`],
    /// which is written back before returning.
    pub async fn load_or_init<F: NorFlash>(&self, flash: &mut F) -> Result<LoadedVersion, Error> {
        let stored = self.read(flash).await?;
        if is_plausible(&stored) {
            info!("stored firmware version: {}", stored.as_str());
            return Ok(LoadedVersion {
                version: stored,
                healed: false,
                raised: false,
            });
        }

        warn!("version record blank or corrupt, writing default");
        self.write(flash, DEFAULT_VERSION).await?;
        let mut version = VersionString::new();
        let _ = version.push_str(DEFAULT_VERSION);
        Ok(LoadedVersion {
            version,
            healed: true,
            raised: false,
        })
    }

    /// [`load_or_init`](Self::load_or_init), then make sure the record is
    /// not older than `floor`, the version the running image was built as.
    ///
    /// Repairs a record left behind when the write-back after an update
    /// failed; without it the same image would be downloaded again.
    pub async fn load_with_floor<F: NorFlash>(
        &self,
        flash: &mut F,
        floor: &str,
    ) -> Result<LoadedVersion, Error> {
        let mut loaded = self.load_or_init(flash).await?;
        if !is_newer(floor, &loaded.version) {
            return Ok(loaded);
        }
        warn!(
            "stored version {} is behind the running build {}",
            loaded.version.as_str(),
            floor
        );
        self.write(flash, floor).await?;
        loaded.version.clear();
        loaded
            .version
            .push_str(floor)
            .map_err(|_| Error::VersionTooLong)?;
        loaded.raised = true;
        Ok(loaded)
    }
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new(VERSION_STORE_FLASH_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::mem_flash::MemFlash;
    use embassy_futures::block_on;

    const BASE: u32 = 0x3F_F000;

    fn store() -> (VersionStore, MemFlash) {
        (VersionStore::new(BASE), MemFlash::new(BASE, 4096))
    }

    #[test]
    fn blank_flash_reads_empty() {
        let (store, mut flash) = store();
        assert_eq!(block_on(store.read(&mut flash)).unwrap().as_str(), "");
    }

    #[test]
    fn write_then_read_round_trips() {
        let (store, mut flash) = store();
        for v in ["1.2.0", "10.20.30", "0.0.1-rc.1+build.2023"] {
            block_on(store.write(&mut flash, v)).unwrap();
            assert_eq!(block_on(store.read(&mut flash)).unwrap().as_str(), v);
        }
    }

    #[test]
    fn full_length_string_round_trips() {
        let (store, mut flash) = store();
        let v = "1234567890.1234567890.123456789";
        assert_eq!(v.len(), VERSION_MAX_LEN);
        block_on(store.write(&mut flash, v)).unwrap();
        assert_eq!(block_on(store.read(&mut flash)).unwrap().as_str(), v);
    }

    #[test]
    fn overlong_string_is_rejected_untouched() {
        let (store, mut flash) = store();
        block_on(store.write(&mut flash, "1.0.0")).unwrap();
        let v = "1234567890.1234567890.1234567890";
        assert_eq!(block_on(store.write(&mut flash, v)), Err(Error::VersionTooLong));
        assert_eq!(block_on(store.read(&mut flash)).unwrap().as_str(), "1.0.0");
    }

    #[test]
    fn record_lives_at_fixed_offset() {
        let (store, mut flash) = store();
        block_on(store.write(&mut flash, "1.2.0")).unwrap();
        let bytes = flash.bytes_at(BASE + 64, 7);
        assert_eq!(bytes, b"1.2.0\0\xFF");
        assert!(flash.bytes_at(BASE, 64).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn unterminated_record_is_capped() {
        let (store, mut flash) = store();
        flash.poke(BASE + 64, &[b'7'; 40]);
        let read = block_on(store.read(&mut flash)).unwrap();
        assert_eq!(read.len(), VERSION_MAX_LEN);
    }

    #[test]
    fn plausibility_rules() {
        assert!(is_plausible("1.0.0"));
        assert!(is_plausible("10.10.100"));
        assert!(!is_plausible(""));
        assert!(!is_plausible("100"));
        assert!(!is_plausible("1.0.0-beta1"));
    }

    #[test]
    fn blank_storage_heals_exactly_once() {
        let (store, mut flash) = store();
        let first = block_on(store.load_or_init(&mut flash)).unwrap();
        assert!(first.healed);
        assert_eq!(first.version.as_str(), "1.0.0");
        assert_eq!(flash.erase_count(), 1);

        let second = block_on(store.load_or_init(&mut flash)).unwrap();
        assert!(!second.healed);
        assert_eq!(second.version.as_str(), "1.0.0");
        assert_eq!(flash.erase_count(), 1);
    }

    #[test]
    fn corrupt_records_heal() {
        for garbage in [&b"\0"[..], b"12345", b"1.2.3.4.5.6.7", &[0xC3, 0x28, b'.', 0]] {
            let (store, mut flash) = store();
            flash.poke(BASE + 64, garbage);
            let loaded = block_on(store.load_or_init(&mut flash)).unwrap();
            assert!(loaded.healed);
            assert_eq!(loaded.version.as_str(), "1.0.0");
            assert_eq!(block_on(store.read(&mut flash)).unwrap().as_str(), "1.0.0");
        }
    }

    #[test]
    fn valid_record_is_kept() {
        let (store, mut flash) = store();
        block_on(store.write(&mut flash, "2.4.1")).unwrap();
        let loaded = block_on(store.load_or_init(&mut flash)).unwrap();
        assert!(!loaded.healed);
        assert_eq!(loaded.version.as_str(), "2.4.1");
    }

    #[test]
    fn flash_failure_surfaces_as_storage_error() {
        let (store, mut flash) = store();
        flash.fail_writes(true);
        assert_eq!(block_on(store.write(&mut flash, "1.2.0")), Err(Error::Storage));
        assert_eq!(block_on(store.load_or_init(&mut flash)), Err(Error::Storage));
    }

    #[test]
    fn stale_record_is_raised_to_the_running_build() {
        let (store, mut flash) = store();
        block_on(store.write(&mut flash, "1.0.0")).unwrap();
        let loaded = block_on(store.load_with_floor(&mut flash, "1.2.0")).unwrap();
        assert!(loaded.raised);
        assert!(!loaded.healed);
        assert_eq!(loaded.version.as_str(), "1.2.0");
        assert_eq!(block_on(store.read(&mut flash)).unwrap().as_str(), "1.2.0");
    }

    #[test]
    fn record_ahead_of_or_equal_to_build_is_kept() {
        for stored in ["1.2.0", "1.3.0"] {
            let (store, mut flash) = store();
            block_on(store.write(&mut flash, stored)).unwrap();
            let erases = flash.erase_count();
            let loaded = block_on(store.load_with_floor(&mut flash, "1.2.0")).unwrap();
            assert!(!loaded.raised);
            assert_eq!(loaded.version.as_str(), stored);
            assert_eq!(flash.erase_count(), erases);
        }
    }
}
