//! Runtime configuration.
//!
//! Values start from [`LoggerConfig::default`], can be overridden by
//! `TELEM_*` key/value pairs (baked in at build time on the device, read from
//! the environment by the simulator) and finally by a postcard-encoded
//! `CONFIG.BIN` at the root of the card.

use alloc::vec::Vec;
use core::str::FromStr;

use heapless::String;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::record::RecordLayout;
use crate::sensors::RetryPolicy;
use crate::storage::{DEFAULT_LOG_FILE, LogStore, MAX_NAME_LEN, StorageError, validate_name};

pub const CONFIG_FILE: &str = "CONFIG.BIN";

/// Bigger than any encoded config; anything longer is not ours.
const MAX_CONFIG_BYTES: usize = 256;

pub const KEY_LOG_FILE: &str = "TELEM_LOG_FILE";
pub const KEY_SEA_LEVEL_HPA: &str = "TELEM_SEA_LEVEL_HPA";
pub const KEY_SAMPLE_INTERVAL_MS: &str = "TELEM_SAMPLE_INTERVAL_MS";
pub const KEY_LAYOUT: &str = "TELEM_LAYOUT";
pub const KEY_AUTOSTART: &str = "TELEM_AUTOSTART";

/// Only settable through [`CONFIG_FILE`], so it has no `TELEM_*` key.
const FIELD_CONSOLE_POLL_MS: &str = "console_poll_ms";

pub const OVERRIDE_KEYS: [&str; 5] = [
    KEY_LOG_FILE,
    KEY_SEA_LEVEL_HPA,
    KEY_SAMPLE_INTERVAL_MS,
    KEY_LAYOUT,
    KEY_AUTOSTART,
];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
    #[error("unknown setting")]
    UnknownKey,
    #[error("config file is corrupt")]
    Decode,
    #[error("config could not be encoded")]
    Encode,
    #[error("config file: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        ConfigError::Storage(e)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggerConfig {
    /// 8.3 name of the log file in the card's root directory.
    pub log_file: String<MAX_NAME_LEN>,
    pub layout: RecordLayout,
    /// Time between records.
    pub sample_interval_ms: u32,
    /// Time between console polls; kept short so commands feel responsive.
    pub console_poll_ms: u32,
    /// Reference pressure for the altitude estimate.
    pub sea_level_hpa: f32,
    pub imu_retry: RetryPolicy,
    /// Start a fresh log as soon as storage is ready, without a `start`.
    pub autostart: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_file: String::from_str(DEFAULT_LOG_FILE).unwrap_or_default(),
            layout: RecordLayout::Telemetry,
            sample_interval_ms: 1000,
            console_poll_ms: 50,
            sea_level_hpa: 1013.25,
            imu_retry: RetryPolicy::default(),
            autostart: false,
        }
    }
}

impl LoggerConfig {
    /// Reject values the logger cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_name(&self.log_file).map_err(|_| ConfigError::InvalidValue(KEY_LOG_FILE))?;
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(KEY_SAMPLE_INTERVAL_MS));
        }
        if self.console_poll_ms == 0 {
            return Err(ConfigError::InvalidValue(FIELD_CONSOLE_POLL_MS));
        }
        if !(self.sea_level_hpa > 0.0 && self.sea_level_hpa < 2000.0) {
            return Err(ConfigError::InvalidValue(KEY_SEA_LEVEL_HPA));
        }
        Ok(())
    }

    /// Apply one `TELEM_*` setting. The config is unchanged on error.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let mut next = self.clone();

        match key {
            KEY_LOG_FILE => {
                next.log_file =
                    String::from_str(value).map_err(|_| ConfigError::InvalidValue(KEY_LOG_FILE))?;
            }
            KEY_SEA_LEVEL_HPA => {
                next.sea_level_hpa = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(KEY_SEA_LEVEL_HPA))?;
            }
            KEY_SAMPLE_INTERVAL_MS => {
                next.sample_interval_ms = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(KEY_SAMPLE_INTERVAL_MS))?;
            }
            KEY_LAYOUT => {
                next.layout =
                    RecordLayout::from_name(value).ok_or(ConfigError::InvalidValue(KEY_LAYOUT))?;
            }
            KEY_AUTOSTART => {
                next.autostart = match value {
                    "1" | "true" | "yes" => true,
                    "0" | "false" | "no" => false,
                    _ => return Err(ConfigError::InvalidValue(KEY_AUTOSTART)),
                };
            }
            _ => return Err(ConfigError::UnknownKey),
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Apply every present override, skipping bad ones with a warning.
    pub fn apply_overrides<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        for (key, value) in pairs {
            let Some(value) = value else { continue };
            match self.apply_override(key, value) {
                Ok(()) => info!("Config override {}={}", key, value),
                Err(e) => warn!("Ignoring {}={:?}: {}", key, value, e),
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }

    /// Read [`CONFIG_FILE`] from `store`. `Ok(None)` when there is none.
    pub fn load<S: LogStore>(store: &mut S) -> Result<Option<Self>, ConfigError> {
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            let n = match store.read_at(CONFIG_FILE, bytes.len() as u32, &mut chunk) {
                Ok(n) => n,
                Err(StorageError::NotFound) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            if bytes.len() > MAX_CONFIG_BYTES {
                return Err(ConfigError::Decode);
            }
        }
        Self::from_bytes(&bytes).map(Some)
    }

    pub fn save<S: LogStore>(&self, store: &mut S) -> Result<(), ConfigError> {
        let bytes = self.to_bytes()?;
        store.create(CONFIG_FILE, &bytes)?;
        Ok(())
    }

    /// Replace `self` with the card's config if one loads cleanly; otherwise
    /// keep the current values.
    pub fn merge_from_store<S: LogStore>(&mut self, store: &mut S) {
        match Self::load(store) {
            Ok(Some(config)) => {
                info!("Loaded {} from storage", CONFIG_FILE);
                *self = config;
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring {}: {}", CONFIG_FILE, e),
        }
    }
}
