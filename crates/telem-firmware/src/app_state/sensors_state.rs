//! Sensor bring-up on the shared I2C bus
//!
//! Each slot holds `None` when its chip failed to initialize, so the loop
//! keeps logging whatever is left. Sensors disabled via feature flags use
//! [`Absent`] instead and never produce a reading.

use embassy_time::Delay;
use log::{error, info};
use telem_core::app_state::Sensors;
use telem_core::config::LoggerConfig;
#[allow(unused_imports)]
use telem_core::sensors::Absent;

#[cfg(feature = "sensor-bmp280")]
use telem_core::sensors::{Bmp280, bmp280};
#[cfg(feature = "sensor-gnss")]
use telem_core::sensors::{UbloxGnss, gnss};
#[cfg(feature = "sensor-icm20948")]
use telem_core::sensors::{Icm20948, icm20948};

use super::{I2cBusMutex, SharedBus};

#[cfg(feature = "sensor-bmp280")]
pub type BarometerSlot = Option<Bmp280<SharedBus, Delay>>;
#[cfg(not(feature = "sensor-bmp280"))]
pub type BarometerSlot = Absent;

#[cfg(feature = "sensor-icm20948")]
pub type ImuSlot = Option<Icm20948<SharedBus, Delay>>;
#[cfg(not(feature = "sensor-icm20948"))]
pub type ImuSlot = Absent;

#[cfg(feature = "sensor-gnss")]
pub type GnssSlot = Option<UbloxGnss<SharedBus>>;
#[cfg(not(feature = "sensor-gnss"))]
pub type GnssSlot = Absent;

pub type SensorsState = Sensors<BarometerSlot, ImuSlot, GnssSlot>;

#[cfg(feature = "sensor-bmp280")]
async fn init_barometer(bus: &'static I2cBusMutex, config: &LoggerConfig) -> BarometerSlot {
    let mut barometer = Bmp280::new(
        SharedBus::new(bus),
        Delay,
        bmp280::DEFAULT_ADDRESS,
        config.sea_level_hpa,
    );
    match barometer.init().await {
        Ok(()) => {
            info!("BMP280 ready");
            Some(barometer)
        }
        Err(e) => {
            error!("{}; barometer fields will read N/A", e);
            None
        }
    }
}

#[cfg(not(feature = "sensor-bmp280"))]
async fn init_barometer(_bus: &'static I2cBusMutex, _config: &LoggerConfig) -> BarometerSlot {
    Absent
}

/// Blocks until the IMU is up or the retry policy runs out.
#[cfg(feature = "sensor-icm20948")]
async fn init_imu(bus: &'static I2cBusMutex, config: &LoggerConfig) -> ImuSlot {
    let mut imu = Icm20948::new(SharedBus::new(bus), Delay, icm20948::DEFAULT_ADDRESS);
    match imu.init_with_retry(&config.imu_retry).await {
        Ok(_) => Some(imu),
        Err(e) => {
            error!("{}; continuing without IMU", e);
            None
        }
    }
}

#[cfg(not(feature = "sensor-icm20948"))]
async fn init_imu(_bus: &'static I2cBusMutex, _config: &LoggerConfig) -> ImuSlot {
    Absent
}

#[cfg(feature = "sensor-gnss")]
async fn init_gnss(bus: &'static I2cBusMutex) -> GnssSlot {
    let mut gnss = UbloxGnss::new(SharedBus::new(bus), gnss::DEFAULT_ADDRESS);
    match gnss.init().await {
        Ok(()) => {
            info!("GNSS receiver answering");
            Some(gnss)
        }
        Err(e) => {
            error!("{}; position fields will read N/A", e);
            None
        }
    }
}

#[cfg(not(feature = "sensor-gnss"))]
async fn init_gnss(_bus: &'static I2cBusMutex) -> GnssSlot {
    Absent
}

/// Bring up every compiled-in sensor, one after the other.
pub async fn init_sensors(bus: &'static I2cBusMutex, config: &LoggerConfig) -> SensorsState {
    Sensors {
        barometer: init_barometer(bus, config).await,
        imu: init_imu(bus, config).await,
        gnss: init_gnss(bus).await,
    }
}
