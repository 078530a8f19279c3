//! Over-the-air update protocol.
//!
//! One cycle: ask the server for the latest version, compare it with the
//! running one, and if it is newer stream the image into the inactive slot.
//! Only a fully written and activated image is followed by a version
//! write-back and a restart; every failure leaves the running image and the
//! stored version alone.
//!
//! The manager is hardware-agnostic.  HTTP access comes in through
//! [`UpdateTransport`] and everything that touches flash, the display or
//! the reset line through [`UpdateTarget`].

use crate::config::{
    FIRMWARE_PATH, SERVER_BASE_URL, UPDATE_FLUSH_DELAY_MS, VERSION_CHECK_PATH,
    VERSION_PERSIST_ATTEMPTS, VERSION_PERSIST_RETRY_MS,
};
use crate::error::{ApplyError, Error};
use crate::net::{endpoint_url, parse_version_response, DeviceId};

use super::store::VersionString;
use super::version::is_newer;

/// Room for the version-check response body.
pub const VERSION_BODY_CAPACITY: usize = 256;

/// Destination of a streamed firmware image.
///
/// Nothing written here becomes bootable until [`commit`](Self::commit).
#[allow(async_fn_in_trait)]
pub trait FirmwareSink {
    /// Prepare the inactive slot.  `size` is the announced image length.
    async fn begin(&mut self, size: Option<u32>) -> Result<(), Error>;
    /// Append the next piece of the image.
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), Error>;
    /// Mark the written image as the next boot target.
    async fn commit(&mut self) -> Result<(), Error>;
    /// Discard a partial image.  Safe to call when nothing was begun.
    async fn abort(&mut self);
}

/// The device side of an update: image sink plus the post-apply steps.
#[allow(async_fn_in_trait)]
pub trait UpdateTarget: FirmwareSink {
    async fn persist_version(&mut self, version: &str) -> Result<(), Error>;
    /// Show the "updating" screen.
    async fn show_updating(&mut self);
    async fn delay_ms(&mut self, ms: u64);
    /// Controlled reset.  Does not return on hardware.
    async fn restart(&mut self);
}

/// Result of a firmware download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FetchOutcome {
    /// The whole image went into the sink.
    Complete { bytes: u32 },
    /// The server has nothing to send (HTTP 304).
    NoUpdate,
}

/// HTTP access to the update server.
#[allow(async_fn_in_trait)]
pub trait UpdateTransport {
    /// Station link has an IPv4 configuration.
    fn is_connected(&self) -> bool;

    /// GET `url` and copy the body into `body`, returning its length.
    /// Anything but 200 is an [`Error::HttpStatus`].
    async fn get(&mut self, url: &str, body: &mut [u8]) -> Result<usize, Error>;

    /// GET `url` and stream a 200 body into `sink`, calling
    /// [`FirmwareSink::begin`] first.  A 304 returns
    /// [`FetchOutcome::NoUpdate`] without touching the sink.
    async fn fetch_firmware<S: FirmwareSink>(
        &mut self,
        url: &str,
        sink: &mut S,
    ) -> Result<FetchOutcome, Error>;
}

/// What one cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateOutcome {
    /// No network; nothing attempted.
    Skipped,
    UpToDate,
    /// Aborted this cycle; the running image is untouched.
    Failed(Error),
    /// A new image was activated and the restart requested.
    Restarting(VersionString),
}

/// Update protocol state: who we are and what we run.
pub struct UpdateManager<'a> {
    device_id: DeviceId,
    current: VersionString,
    base_url: &'a str,
}

impl UpdateManager<'static> {
    pub fn new(device_id: DeviceId, current: VersionString) -> Self {
        Self::with_base_url(device_id, current, SERVER_BASE_URL)
    }
}

impl<'a> UpdateManager<'a> {
    pub fn with_base_url(device_id: DeviceId, current: VersionString, base_url: &'a str) -> Self {
        Self {
            device_id,
            current,
            base_url,
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Run one check / apply cycle.
    pub async fn check_and_apply<T, U>(&mut self, transport: &mut T, target: &mut U) -> UpdateOutcome
    where
        T: UpdateTransport,
        U: UpdateTarget,
    {
        if !transport.is_connected() {
            debug!("update check skipped: offline");
            return UpdateOutcome::Skipped;
        }

        let latest = match self.fetch_latest(transport).await {
            Ok(latest) => latest,
            Err(e) => {
                warn!("version check failed: {}", e);
                return UpdateOutcome::Failed(e);
            }
        };

        if !is_newer(&latest, &self.current) {
            info!(
                "firmware up to date (running {}, server {})",
                self.current.as_str(),
                latest.as_str()
            );
            return UpdateOutcome::UpToDate;
        }

        info!("update available: {} -> {}", self.current.as_str(), latest.as_str());
        match self.download(transport, target).await {
            Ok(FetchOutcome::Complete { bytes }) => {
                info!("image written ({} bytes)", bytes);
            }
            Ok(FetchOutcome::NoUpdate) => {
                target.abort().await;
                info!("server has no image to send");
                return UpdateOutcome::UpToDate;
            }
            Err(e) => {
                target.abort().await;
                error!("update failed: {}", e);
                return UpdateOutcome::Failed(e);
            }
        }

        self.persist(target, &latest).await;
        target.show_updating().await;
        target.delay_ms(UPDATE_FLUSH_DELAY_MS).await;
        self.current = latest.clone();
        info!("restarting into {}", latest.as_str());
        target.restart().await;
        UpdateOutcome::Restarting(latest)
    }

    /// Write the new version back, retrying a few times.  The new image is
    /// active either way; a record left stale is raised at the next boot.
    async fn persist<U: UpdateTarget>(&self, target: &mut U, version: &str) {
        for attempt in 1..=VERSION_PERSIST_ATTEMPTS {
            match target.persist_version(version).await {
                Ok(()) => return,
                Err(e) => {
                    warn!("version write {} of {} failed: {}", attempt, VERSION_PERSIST_ATTEMPTS, e);
                    if attempt < VERSION_PERSIST_ATTEMPTS {
                        target.delay_ms(VERSION_PERSIST_RETRY_MS).await;
                    }
                }
            }
        }
        error!("could not persist version {}", version);
    }

    async fn fetch_latest<T: UpdateTransport>(&self, transport: &mut T) -> Result<VersionString, Error> {
        let url = endpoint_url(self.base_url, VERSION_CHECK_PATH, &self.device_id)?;
        let mut body = [0u8; VERSION_BODY_CAPACITY];
        let len = transport.get(&url, &mut body).await?;
        parse_version_response(&body[..len])
    }

    async fn download<T, U>(&self, transport: &mut T, target: &mut U) -> Result<FetchOutcome, Error>
    where
        T: UpdateTransport,
        U: UpdateTarget,
    {
        let url = endpoint_url(self.base_url, FIRMWARE_PATH, &self.device_id)?;
        let outcome = transport.fetch_firmware(&url, target).await?;
        if let FetchOutcome::Complete { bytes } = outcome {
            if bytes == 0 {
                return Err(ApplyError::EmptyImage.into());
            }
            target.commit().await?;
        }
        Ok(outcome)
    }
}
