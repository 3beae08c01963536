//! A [`LogStore`] backed by a host directory standing in for the SD card root.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::warn;
use telem_core::storage::{LogStore, StorageError, validate_name};

pub struct DirStore {
    root: PathBuf,
    mounted: bool,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounted: false,
        }
    }

    fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        validate_name(name)?;
        Ok(self.root.join(name.to_ascii_uppercase()))
    }
}

fn storage_error(err: io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound,
        io::ErrorKind::StorageFull => StorageError::Full,
        _ => {
            warn!("host filesystem error: {}", err);
            StorageError::Device
        }
    }
}

impl LogStore for DirStore {
    fn mount(&mut self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(storage_error)?;
        self.mounted = true;
        Ok(())
    }

    fn exists(&mut self, name: &str) -> Result<bool, StorageError> {
        Ok(self.path(name)?.is_file())
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        fs::remove_file(self.path(name)?).map_err(storage_error)
    }

    fn create(&mut self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        fs::write(self.path(name)?, contents).map_err(storage_error)
    }

    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name)?)
            .map_err(storage_error)?;
        file.write_all(bytes).map_err(storage_error)?;
        file.flush().map_err(storage_error)
    }

    fn append_line(&mut self, name: &str, line: &str) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name)?)
            .map_err(storage_error)?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush())
            .map_err(storage_error)
    }

    fn read_at(
        &mut self,
        name: &str,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        let mut file = fs::File::open(self.path(name)?).map_err(storage_error)?;
        file.seek(SeekFrom::Start(u64::from(offset)))
            .map_err(storage_error)?;
        file.read(buf).map_err(storage_error)
    }
}
