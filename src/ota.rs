//! OTA image writer and the device side of the update protocol.
//!
//! The image goes into the inactive app slot of the esp-idf partition
//! table, one flash sector at a time.  Nothing is bootable until
//! [`FirmwareSink::commit`] flips the otadata selection; an aborted or
//! failed download leaves the running slot selected.
//!
//! The version record and the saved WiFi credentials live in separate
//! sectors of the same flash chip, so [`OtaWriter`] owns the one
//! `FlashStorage` and lends it to the [`VersionStore`] and the
//! [`CredentialStore`] when needed.

use defmt::{info, warn, Debug2Format};
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_time::Timer;
use embedded_storage::nor_flash::NorFlash;
use esp_bootloader_esp_idf::ota::OtaImageState;
use esp_bootloader_esp_idf::ota_updater::OtaUpdater;
use esp_bootloader_esp_idf::partitions::{self, PartitionType, PARTITION_TABLE_MAX_LEN};
use esp_storage::FlashStorage;
use knobby::app::Screen;
use knobby::config::BUILD_VERSION;
use knobby::error::ApplyError;
use knobby::firmware::{FirmwareSink, LoadedVersion, UpdateTarget, VersionStore};
use knobby::net::{CredentialStore, Credentials};
use knobby::Error;

use crate::ui::display::{self, Display};

/// Flash erase unit.
const SECTOR: usize = FlashStorage::SECTOR_SIZE as usize;

/// Flash write granularity.
const WORD: usize = 4;

/// The slot currently being written.
struct Slot {
    offset: u32,
    len: u32,
    written: u32,
}

/// Streams an image into the inactive OTA slot.
pub struct OtaWriter {
    flash: FlashStorage<'static>,
    store: VersionStore,
    credentials: CredentialStore,
    table: [u8; PARTITION_TABLE_MAX_LEN],
    sector: [u8; SECTOR],
    filled: usize,
    slot: Option<Slot>,
}

impl OtaWriter {
    pub fn new(flash: FlashStorage<'static>) -> Self {
        Self {
            flash,
            store: VersionStore::default(),
            credentials: CredentialStore::default(),
            table: [0; PARTITION_TABLE_MAX_LEN],
            sector: [0; SECTOR],
            filled: 0,
            slot: None,
        }
    }

    /// Boot-time version load.  Heals a blank record and raises one left
    /// behind the running build.
    pub async fn load_version(&mut self) -> Result<LoadedVersion, Error> {
        let mut flash = BlockingAsync::new(&mut self.flash);
        self.store.load_with_floor(&mut flash, BUILD_VERSION).await
    }

    pub async fn persist_version(&mut self, version: &str) -> Result<(), Error> {
        let mut flash = BlockingAsync::new(&mut self.flash);
        self.store.write(&mut flash, version).await
    }

    /// Credentials saved by an earlier portal session.
    pub async fn load_credentials(&mut self) -> Result<Credentials, Error> {
        let mut flash = BlockingAsync::new(&mut self.flash);
        self.credentials.read(&mut flash).await
    }

    pub async fn save_credentials(&mut self, creds: &Credentials) -> Result<(), Error> {
        let mut flash = BlockingAsync::new(&mut self.flash);
        self.credentials.write(&mut flash, creds).await
    }

    /// Confirm a freshly activated image so the bootloader keeps it.
    pub fn mark_running_valid(&mut self) {
        let mut ota = match OtaUpdater::new(&mut self.flash, &mut self.table) {
            Ok(ota) => ota,
            Err(e) => {
                warn!("no OTA data: {:?}", Debug2Format(&e));
                return;
            }
        };
        match ota.current_ota_state() {
            Ok(OtaImageState::New) | Ok(OtaImageState::PendingVerify) => {
                match ota.set_current_ota_state(OtaImageState::Valid) {
                    Ok(()) => info!("running image marked valid"),
                    Err(e) => warn!("could not confirm image: {:?}", Debug2Format(&e)),
                }
            }
            _ => {}
        }
    }

    /// Locate the slot the bootloader would switch to next.
    fn next_slot(&mut self) -> Result<(u32, u32), Error> {
        let subtype = {
            let mut ota = OtaUpdater::new(&mut self.flash, &mut self.table)
                .map_err(|_| ApplyError::NoTargetSlot)?;
            let (_, subtype) = ota.next_partition().map_err(|_| ApplyError::NoTargetSlot)?;
            subtype
        };
        let table = partitions::read_partition_table(&mut self.flash, &mut self.table)
            .map_err(|_| ApplyError::NoTargetSlot)?;
        let entry = table
            .find_partition(PartitionType::App(subtype))
            .map_err(|_| ApplyError::NoTargetSlot)?
            .ok_or(ApplyError::NoTargetSlot)?;
        Ok((entry.offset(), entry.len()))
    }

    /// Erase and program the next sector from the staging buffer.
    fn flush_sector(&mut self) -> Result<(), Error> {
        if self.filled == 0 {
            return Ok(());
        }
        let slot = self.slot.as_mut().ok_or(ApplyError::WriteFailed)?;
        if slot.written + SECTOR as u32 > slot.len {
            return Err(ApplyError::ImageTooLarge.into());
        }

        let padded = self.filled.next_multiple_of(WORD);
        self.sector[self.filled..padded].fill(0xFF);

        let at = slot.offset + slot.written;
        self.flash
            .erase(at, at + SECTOR as u32)
            .map_err(|_| ApplyError::WriteFailed)?;
        self.flash
            .write(at, &self.sector[..padded])
            .map_err(|_| ApplyError::WriteFailed)?;

        slot.written += SECTOR as u32;
        self.filled = 0;
        Ok(())
    }
}

impl FirmwareSink for OtaWriter {
    async fn begin(&mut self, size: Option<u32>) -> Result<(), Error> {
        let (offset, len) = self.next_slot()?;
        if size.is_some_and(|size| size > len) {
            return Err(ApplyError::ImageTooLarge.into());
        }
        info!("writing image to slot at {:#x} ({} bytes free)", offset, len);
        self.slot = Some(Slot {
            offset,
            len,
            written: 0,
        });
        self.filled = 0;
        Ok(())
    }

    async fn write_chunk(&mut self, mut chunk: &[u8]) -> Result<(), Error> {
        if self.slot.is_none() {
            return Err(ApplyError::WriteFailed.into());
        }
        while !chunk.is_empty() {
            let take = (SECTOR - self.filled).min(chunk.len());
            self.sector[self.filled..self.filled + take].copy_from_slice(&chunk[..take]);
            self.filled += take;
            chunk = &chunk[take..];
            if self.filled == SECTOR {
                self.flush_sector()?;
            }
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), Error> {
        self.flush_sector()?;
        self.slot = None;
        let mut ota = OtaUpdater::new(&mut self.flash, &mut self.table)
            .map_err(|_| ApplyError::ActivateFailed)?;
        ota.activate_next_partition()
            .map_err(|_| ApplyError::ActivateFailed)?;
        ota.set_current_ota_state(OtaImageState::New)
            .map_err(|_| ApplyError::ActivateFailed)?;
        info!("new image activated");
        Ok(())
    }

    async fn abort(&mut self) {
        if self.slot.take().is_some() {
            warn!("image write abandoned");
        }
        self.filled = 0;
    }
}

/// One update cycle's view of the hardware: the OTA writer plus the
/// display for the progress screen.
pub struct EspUpdateTarget<'a, I2C> {
    pub ota: &'a mut OtaWriter,
    pub display: &'a mut Display<I2C>,
}

impl<I2C> FirmwareSink for EspUpdateTarget<'_, I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    async fn begin(&mut self, size: Option<u32>) -> Result<(), Error> {
        display::draw(self.display, &Screen::Updating);
        self.ota.begin(size).await
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.ota.write_chunk(chunk).await
    }

    async fn commit(&mut self) -> Result<(), Error> {
        self.ota.commit().await
    }

    async fn abort(&mut self) {
        self.ota.abort().await
    }
}

impl<I2C> UpdateTarget for EspUpdateTarget<'_, I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    async fn persist_version(&mut self, version: &str) -> Result<(), Error> {
        self.ota.persist_version(version).await
    }

    async fn show_updating(&mut self) {
        display::draw(self.display, &Screen::Updating);
    }

    async fn delay_ms(&mut self, ms: u64) {
        Timer::after_millis(ms).await;
    }

    async fn restart(&mut self) {
        display::draw(self.display, &Screen::Restarting);
        esp_hal::system::software_reset();
    }
}
