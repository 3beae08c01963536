//! The logging session: which file is logged to, whether records are being
//! appended, and the time all record timestamps are relative to.

use alloc::vec::Vec;
use heapless::String;
use log::{error, info, warn};

use super::{LogStore, MAX_NAME_LEN, StorageError, validate_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingState {
    /// The medium never mounted (or has not been tried yet).
    Uninitialized,
    /// Mounted, records are discarded.
    Idle,
    /// Mounted, records are appended.
    Logging,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSession {
    pub state: LoggingState,
    pub file_path: String<MAX_NAME_LEN>,
    pub base_time_ms: u64,
}

impl LoggingSession {
    pub fn is_logging(&self) -> bool {
        self.state == LoggingState::Logging
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Dropped because the session is not logging.
    NotLogging,
}

/// Owns the log store and the single logging session.
pub struct StorageWriter<S> {
    store: S,
    session: LoggingSession,
    header: &'static str,
}

impl<S: LogStore> StorageWriter<S> {
    /// `header` is written as the first line of every fresh log file.
    pub fn new(store: S, file_path: &str, header: &'static str) -> Result<Self, StorageError> {
        validate_name(file_path)?;
        let file_path = String::try_from(file_path).map_err(|_| StorageError::InvalidName)?;

        Ok(Self {
            store,
            session: LoggingSession {
                state: LoggingState::Uninitialized,
                file_path,
                base_time_ms: 0,
            },
            header,
        })
    }

    pub fn session(&self) -> &LoggingSession {
        &self.session
    }

    pub fn is_logging(&self) -> bool {
        self.session.is_logging()
    }

    pub fn file_path(&self) -> &str {
        &self.session.file_path
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Mount the medium and make sure the log file exists, then go idle.
    /// On failure the session stays uninitialized.
    pub fn initialize(&mut self, now_ms: u64) -> Result<(), StorageError> {
        let result = self.mount_and_prepare();
        match result {
            Ok(()) => {
                self.session.state = LoggingState::Idle;
                self.session.base_time_ms = now_ms;
                info!("Log storage ready, file {}", self.session.file_path);
            }
            Err(e) => {
                self.session.state = LoggingState::Uninitialized;
                error!("Log storage unavailable: {}", e);
            }
        }
        result
    }

    fn mount_and_prepare(&mut self) -> Result<(), StorageError> {
        self.store.mount()?;
        if !self.store.exists(&self.session.file_path)? {
            self.write_header()?;
        }
        Ok(())
    }

    /// A mount that failed earlier is retried here, so a card inserted
    /// after boot still becomes usable.
    fn ensure_mounted(&mut self) -> Result<(), StorageError> {
        if self.session.state == LoggingState::Uninitialized {
            self.store.mount()?;
            self.session.state = LoggingState::Idle;
            info!("Log storage mounted late");
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), StorageError> {
        let mut first_line = String::<160>::new();
        first_line
            .push_str(self.header)
            .and_then(|_| first_line.push('\n'))
            .map_err(|_| StorageError::Device)?;
        self.store
            .create(&self.session.file_path, first_line.as_bytes())
    }

    /// Truncate the log file to just its header, reset the time base and
    /// start appending. If the file cannot be recreated the session drops to
    /// idle, so no headerless file gets appended to.
    pub fn start(&mut self, now_ms: u64) -> Result<(), StorageError> {
        self.ensure_mounted()?;

        if let Err(e) = self.truncate_to_header() {
            if self.session.state == LoggingState::Logging {
                warn!("Logging halted, {} could not be recreated", self.session.file_path);
            }
            self.session.state = LoggingState::Idle;
            return Err(e);
        }

        self.session.base_time_ms = now_ms;
        self.session.state = LoggingState::Logging;
        info!("Logging started, {} cleared", self.session.file_path);
        Ok(())
    }

    fn truncate_to_header(&mut self) -> Result<(), StorageError> {
        match self.store.remove(&self.session.file_path) {
            Ok(()) | Err(StorageError::NotFound) => {}
            Err(e) => return Err(e),
        }
        self.write_header()
    }

    /// Stop appending. Every write is flushed as it happens, so there is
    /// nothing left to close.
    pub fn stop(&mut self) {
        if self.session.state == LoggingState::Logging {
            self.session.state = LoggingState::Idle;
            info!("Logging stopped");
        }
    }

    /// Resume appending to the existing file, keeping the time base.
    pub fn continue_logging(&mut self) -> Result<(), StorageError> {
        self.ensure_mounted()?;

        if !self.store.exists(&self.session.file_path)? {
            warn!("{} vanished, recreating it", self.session.file_path);
            self.write_header()?;
        }

        self.session.state = LoggingState::Logging;
        info!("Logging continued");
        Ok(())
    }

    /// Append `line` and a newline if logging.
    pub fn write(&mut self, line: &str) -> Result<WriteOutcome, StorageError> {
        if !self.is_logging() {
            return Ok(WriteOutcome::NotLogging);
        }

        self.store.append_line(&self.session.file_path, line)?;
        Ok(WriteOutcome::Written)
    }

    /// Read part of the log file, whatever the logging state.
    pub fn read_chunk(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.ensure_mounted()?;
        self.store.read_at(&self.session.file_path, offset, buf)
    }

    /// Read the whole log file. Meant for tests and small files; the console
    /// streams with [`Self::read_chunk`] instead.
    pub fn read_all(&mut self) -> Result<Vec<u8>, StorageError> {
        let mut contents = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = self.read_chunk(contents.len() as u32, &mut buf)?;
            if n == 0 {
                return Ok(contents);
            }
            contents.extend_from_slice(&buf[..n]);
        }
    }

    /// Milliseconds since the session's time base.
    pub fn timestamp_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.session.base_time_ms)
    }
}
