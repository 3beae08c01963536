//! Application-wide state and error types

mod station;

pub use station::*;

use thiserror_no_std::Error;

use crate::config::ConfigError;
use crate::console::ConsoleError;
use crate::sensors::SensorError;
use crate::storage::StorageError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
    #[error("SD card error: {0}")]
    Storage(StorageError),
    #[error("Config error: {0}")]
    Config(ConfigError),
    #[error("Console error: {0}")]
    Console(ConsoleError),
}

impl From<SensorError> for AppError {
    fn from(e: SensorError) -> Self {
        AppError::Sensor(e)
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Storage(e)
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<ConsoleError> for AppError {
    fn from(e: ConsoleError) -> Self {
        AppError::Console(e)
    }
}
