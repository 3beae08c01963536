use embedded_sdmmc::{
    Error, Mode, SdCard, SdCardError, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};
use log::{debug, error};

use super::{LogStore, StorageError, validate_name};

/// FAT timestamps for files the logger creates. There is no RTC, so every
/// file carries the same build-time date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        })
    }
}

impl TimeSource for FixedClock {
    fn get_timestamp(&self) -> Timestamp {
        self.0
    }
}

impl From<Error<SdCardError>> for StorageError {
    fn from(e: Error<SdCardError>) -> Self {
        match e {
            Error::NotFound => StorageError::NotFound,
            Error::FilenameError(_) => StorageError::InvalidName,
            Error::DiskFull => StorageError::Full,
            other => {
                error!("SD card error: {:?}", other);
                StorageError::Device
            }
        }
    }
}

/// Log storage on the first FAT volume of an SPI SD card.
///
/// These operations are blocking: embedded-sdmmc has no async API, and a
/// single small append is short enough not to disturb the sampling loop.
pub struct SdCardStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
}

impl<S, D, T> SdCardStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(sd_card, ts);

        Self { volume_mgr }
    }

    fn write_file(
        &self,
        name: &str,
        mode: Mode,
        parts: &[&[u8]],
    ) -> Result<(), Error<SdCardError>> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(name, mode)?;

        for part in parts {
            file.write(part)?;
        }
        file.flush()?;

        // Handles close on drop too; closing explicitly surfaces the errors.
        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }
}

impl<S, D, T> LogStore for SdCardStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    fn mount(&mut self) -> Result<(), StorageError> {
        // Opening the volume is what first talks to the card.
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        root_dir.close()?;
        volume0.close()?;
        debug!("SD card mounted");
        Ok(())
    }

    fn exists(&mut self, name: &str) -> Result<bool, StorageError> {
        validate_name(name)?;
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;

        let found = match root_dir.find_directory_entry(name) {
            Ok(_) => true,
            Err(Error::NotFound) => false,
            Err(e) => return Err(e.into()),
        };

        root_dir.close()?;
        volume0.close()?;
        Ok(found)
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;

        root_dir.delete_file_in_dir(name)?;

        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }

    fn create(&mut self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        validate_name(name)?;
        Ok(self.write_file(name, Mode::ReadWriteCreateOrTruncate, &[contents])?)
    }

    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_name(name)?;
        Ok(self.write_file(name, Mode::ReadWriteCreateOrAppend, &[bytes])?)
    }

    fn append_line(&mut self, name: &str, line: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        Ok(self.write_file(
            name,
            Mode::ReadWriteCreateOrAppend,
            &[line.as_bytes(), b"\n"],
        )?)
    }

    fn read_at(
        &mut self,
        name: &str,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        validate_name(name)?;
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(name, Mode::ReadOnly)?;

        let read = if offset >= file.length() {
            0
        } else {
            file.seek_from_start(offset)?;
            file.read(buf)?
        };

        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(read)
    }
}
