//! Station credentials saved from the provisioning portal.
//!
//! One record at the start of a dedicated sector:
//! ```text
//! 0x00        magic 0x4B
//! 0x01        layout version
//! 0x02        SSID length
//! 0x03        password length
//! 0x04 .. 0x23  SSID, erased padding
//! 0x24 .. 0x63  password, erased padding
//! ```
//! A sector that does not start with the magic byte holds no credentials.

use embedded_storage_async::nor_flash::NorFlash;

use crate::config::CREDENTIALS_FLASH_OFFSET;
use crate::error::Error;

use super::http::Credentials;

const MAGIC: u8 = 0x4B;
const LAYOUT: u8 = 1;
const ERASED: u8 = 0xFF;

const SSID_AT: usize = 4;
const SSID_CAP: usize = 32;
const PASS_AT: usize = SSID_AT + SSID_CAP;
const PASS_CAP: usize = 64;

/// Whole record, a multiple of the flash write size.
pub const RECORD_SIZE: usize = PASS_AT + PASS_CAP;

#[derive(Clone, Copy, Debug)]
pub struct CredentialStore {
    base: u32,
}

impl CredentialStore {
    pub const fn new(base: u32) -> Self {
        Self { base }
    }

    /// Saved credentials, or [`Error::NotFound`] when the sector is blank
    /// or holds something we did not write.
    pub async fn read<F: NorFlash>(&self, flash: &mut F) -> Result<Credentials, Error> {
        let mut raw = [0u8; RECORD_SIZE];
        flash
            .read(self.base, &mut raw)
            .await
            .map_err(|_| Error::Storage)?;

        if raw[0] != MAGIC || raw[1] != LAYOUT {
            return Err(Error::NotFound);
        }
        let ssid_len = raw[2] as usize;
        let pass_len = raw[3] as usize;
        if ssid_len == 0 || ssid_len > SSID_CAP || pass_len > PASS_CAP {
            return Err(Error::NotFound);
        }

        let ssid = core::str::from_utf8(&raw[SSID_AT..SSID_AT + ssid_len])
            .map_err(|_| Error::NotFound)?;
        let pass = core::str::from_utf8(&raw[PASS_AT..PASS_AT + pass_len])
            .map_err(|_| Error::NotFound)?;
        Credentials::new(ssid, pass)
    }

    /// Replace the saved credentials.  Erases the sector first.
    pub async fn write<F: NorFlash>(&self, flash: &mut F, creds: &Credentials) -> Result<(), Error> {
        if creds.ssid.is_empty() {
            return Err(Error::BadRequest);
        }

        let mut record = [ERASED; RECORD_SIZE];
        record[0] = MAGIC;
        record[1] = LAYOUT;
        record[2] = creds.ssid.len() as u8;
        record[3] = creds.pass.len() as u8;
        record[SSID_AT..SSID_AT + creds.ssid.len()].copy_from_slice(creds.ssid.as_bytes());
        record[PASS_AT..PASS_AT + creds.pass.len()].copy_from_slice(creds.pass.as_bytes());

        self.erase(flash).await?;
        flash
            .write(self.base, &record)
            .await
            .map_err(|_| Error::Storage)?;
        info!("station credentials saved");
        Ok(())
    }

    /// Forget the saved credentials.
    pub async fn clear<F: NorFlash>(&self, flash: &mut F) -> Result<(), Error> {
        self.erase(flash).await
    }

    async fn erase<F: NorFlash>(&self, flash: &mut F) -> Result<(), Error> {
        flash
            .erase(self.base, self.base + F::ERASE_SIZE as u32)
            .await
            .map_err(|_| Error::Storage)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(CREDENTIALS_FLASH_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::mem_flash::MemFlash;
    use embassy_futures::block_on;

    const BASE: u32 = 0x3F_E000;

    fn store() -> (CredentialStore, MemFlash) {
        (CredentialStore::new(BASE), MemFlash::new(BASE, 4096))
    }

    #[test]
    fn blank_sector_has_no_credentials() {
        let (store, mut flash) = store();
        assert_eq!(block_on(store.read(&mut flash)), Err(Error::NotFound));
    }

    #[test]
    fn saved_credentials_survive_a_reboot() {
        let (store, mut flash) = store();
        let creds = Credentials::new("HomeNet", "hunter22").unwrap();
        block_on(store.write(&mut flash, &creds)).unwrap();

        // A fresh store over the same flash, as after a restart.
        let rebooted = CredentialStore::new(BASE);
        assert_eq!(block_on(rebooted.read(&mut flash)), Ok(creds));
    }

    #[test]
    fn open_network_and_full_length_fields() {
        let (store, mut flash) = store();
        let open = Credentials::new("Cafe", "").unwrap();
        block_on(store.write(&mut flash, &open)).unwrap();
        assert_eq!(block_on(store.read(&mut flash)), Ok(open));

        let ssid = "S".repeat(32);
        let pass = "p".repeat(64);
        let full = Credentials::new(&ssid, &pass).unwrap();
        block_on(store.write(&mut flash, &full)).unwrap();
        assert_eq!(block_on(store.read(&mut flash)), Ok(full));
    }

    #[test]
    fn foreign_or_damaged_records_are_ignored() {
        let (store, mut flash) = store();
        flash.poke(BASE, b"hello world");
        assert_eq!(block_on(store.read(&mut flash)), Err(Error::NotFound));

        let (store, mut flash) = self::store();
        flash.poke(BASE, &[MAGIC, LAYOUT, 0, 0]);
        assert_eq!(block_on(store.read(&mut flash)), Err(Error::NotFound));

        let (store, mut flash) = self::store();
        flash.poke(BASE, &[MAGIC, LAYOUT, 40, 0]);
        assert_eq!(block_on(store.read(&mut flash)), Err(Error::NotFound));

        let (store, mut flash) = self::store();
        flash.poke(BASE, &[MAGIC, LAYOUT, 2, 0, 0xC3, 0x28]);
        assert_eq!(block_on(store.read(&mut flash)), Err(Error::NotFound));
    }

    #[test]
    fn clear_forgets_credentials() {
        let (store, mut flash) = store();
        let creds = Credentials::new("HomeNet", "hunter22").unwrap();
        block_on(store.write(&mut flash, &creds)).unwrap();
        block_on(store.clear(&mut flash)).unwrap();
        assert_eq!(block_on(store.read(&mut flash)), Err(Error::NotFound));
    }

    #[test]
    fn empty_ssid_is_not_written() {
        let (store, mut flash) = store();
        let creds = Credentials::default();
        assert_eq!(block_on(store.write(&mut flash, &creds)), Err(Error::BadRequest));
        assert_eq!(flash.erase_count(), 0);
    }

    #[test]
    fn failed_flash_write_is_a_storage_error() {
        let (store, mut flash) = store();
        flash.fail_writes(true);
        let creds = Credentials::new("HomeNet", "").unwrap();
        assert_eq!(block_on(store.write(&mut flash, &creds)), Err(Error::Storage));
    }
}
