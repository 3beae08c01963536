//! Persistent storage for the log file.
//!
//! [`LogStore`] is the filesystem seam: whole-file operations on a flat root
//! directory with 8.3 names. Every operation opens, uses and closes its file so
//! nothing is left buffered between calls. [`StorageWriter`] owns the logging
//! session on top of it.

#[cfg(test)]
pub mod memory;
pub mod sd_card;
pub mod writer;

#[cfg(test)]
pub use memory::MemoryStore;
pub use sd_card::{FixedClock, SdCardStore};
pub use writer::{LoggingSession, LoggingState, StorageWriter, WriteOutcome};

use alloc::vec::Vec;
use thiserror_no_std::Error;

/// Name of the log file unless configured otherwise.
pub const DEFAULT_LOG_FILE: &str = "LOG.TXT";

/// Longest 8.3 name, dot included.
pub const MAX_NAME_LEN: usize = 12;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage is not mounted")]
    NotMounted,
    #[error("file not found")]
    NotFound,
    #[error("invalid 8.3 file name")]
    InvalidName,
    #[error("storage device error")]
    Device,
    #[error("storage is full")]
    Full,
}

/// Flat-directory file storage.
pub trait LogStore {
    /// Bring the medium up. Safe to call again after a failure.
    fn mount(&mut self) -> Result<(), StorageError>;

    fn exists(&mut self, name: &str) -> Result<bool, StorageError>;

    /// Delete `name`. Fails with [`StorageError::NotFound`] if it is absent.
    fn remove(&mut self, name: &str) -> Result<(), StorageError>;

    /// Create `name`, or truncate it if it exists, holding exactly `contents`.
    fn create(&mut self, name: &str, contents: &[u8]) -> Result<(), StorageError>;

    /// Append `bytes` to `name`, creating it if needed, and flush.
    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Append `line` followed by a newline as a single write, so a failure
    /// never leaves a line without its terminator.
    fn append_line(&mut self, name: &str, line: &str) -> Result<(), StorageError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.append(name, &bytes)
    }

    /// Read up to `buf.len()` bytes starting at `offset`. Returns 0 at end of file.
    fn read_at(&mut self, name: &str, offset: u32, buf: &mut [u8])
    -> Result<usize, StorageError>;
}

/// Check `name` is a plain FAT short name: 1-8 character base, optional
/// extension of up to 3 characters, no path separators.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let (base, extension) = match name.split_once('.') {
        Some((base, extension)) => (base, extension),
        None => (name, ""),
    };
    let valid_char = |c: char| c.is_ascii_alphanumeric() || "_-~!#$%&'()@^{}".contains(c);

    if base.is_empty()
        || base.len() > 8
        || extension.len() > 3
        || !base.chars().all(valid_char)
        || !extension.chars().all(valid_char)
    {
        return Err(StorageError::InvalidName);
    }
    Ok(())
}
