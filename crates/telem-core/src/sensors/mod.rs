//! Sensor traits, reading types and drivers.
//!
//! Every driver talks to its chip over an `embedded_hal_async::i2c::I2c` bus and
//! implements [`Sensor`], producing a typed reading that knows how many CSV
//! fields it contributes to a log record and how they are formatted.

#[cfg(feature = "sensor-bmp280")]
pub mod bmp280;
#[cfg(feature = "sensor-gnss")]
pub mod gnss;
#[cfg(feature = "sensor-icm20948")]
pub mod icm20948;
pub mod retry;
#[cfg(feature = "sensor-gnss")]
pub mod ubx;

#[cfg(feature = "sensor-bmp280")]
pub use bmp280::Bmp280;
#[cfg(feature = "sensor-gnss")]
pub use gnss::UbloxGnss;
#[cfg(feature = "sensor-icm20948")]
pub use icm20948::Icm20948;
pub use retry::{Backoff, RetryPolicy};

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} failed to {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} timed out waiting to {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor} did not answer on I2C address {address}")]
    I2cError { sensor: &'static str, address: u8 },
}

/// Trait for sensor reading data structures.
/// Provides compile-time guarantees about the number of CSV fields a reading
/// contributes and how many decimals each one is printed with.
pub trait SensorReadings<const COUNT: usize> {
    /// Decimal places used when formatting each field.
    const PRECISION: [usize; COUNT];

    /// Convert the readings into a fixed-size array, in column order.
    fn to_array(&self) -> [f64; COUNT];
}

/// Trait for sensors that produce typed readings.
///
/// `Ok(None)` means "no observation this tick" (no new data, no fix yet) and is
/// not an error; the control loop keeps its cadence either way.
pub trait Sensor<const COUNT: usize> {
    /// The type of readings this sensor produces.
    type Readings: SensorReadings<COUNT>;

    /// Short name used in log messages.
    const NAME: &'static str;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> impl Future<Output = Result<Option<Self::Readings>, SensorError>>;
}

/// A sensor slot that may be empty, either because the feature is disabled or
/// because the chip failed to initialize at boot. An empty slot never
/// produces an observation.
impl<S, const COUNT: usize> Sensor<COUNT> for Option<S>
where
    S: Sensor<COUNT>,
{
    type Readings = S::Readings;

    const NAME: &'static str = S::NAME;

    async fn read(&mut self) -> Result<Option<Self::Readings>, SensorError> {
        match self {
            Some(sensor) => sensor.read().await,
            None => Ok(None),
        }
    }
}

/// Stand-in for a sensor compiled out of the build. Never observes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

impl Sensor<3> for Absent {
    type Readings = BarometerReading;
    const NAME: &'static str = "absent barometer";

    async fn read(&mut self) -> Result<Option<BarometerReading>, SensorError> {
        Ok(None)
    }
}

impl Sensor<9> for Absent {
    type Readings = ImuReading;
    const NAME: &'static str = "absent IMU";

    async fn read(&mut self) -> Result<Option<ImuReading>, SensorError> {
        Ok(None)
    }
}

impl Sensor<2> for Absent {
    type Readings = GnssFix;
    const NAME: &'static str = "absent GNSS";

    async fn read(&mut self) -> Result<Option<GnssFix>, SensorError> {
        Ok(None)
    }
}

/// One forced barometer measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarometerReading {
    pub temperature_c: f32,
    pub pressure_pa: f32,
    pub altitude_m: f32,
}

impl SensorReadings<3> for BarometerReading {
    const PRECISION: [usize; 3] = [2, 0, 2];

    fn to_array(&self) -> [f64; 3] {
        [
            self.temperature_c as f64,
            self.pressure_pa as f64,
            self.altitude_m as f64,
        ]
    }
}

/// Accelerometer (milli-g), gyroscope (deg/s) and magnetometer (uT) axes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuReading {
    pub accel_mg: [f32; 3],
    pub gyro_dps: [f32; 3],
    pub mag_ut: [f32; 3],
}

impl SensorReadings<9> for ImuReading {
    const PRECISION: [usize; 9] = [2; 9];

    fn to_array(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        for (i, value) in self
            .accel_mg
            .iter()
            .chain(self.gyro_dps.iter())
            .chain(self.mag_ut.iter())
            .enumerate()
        {
            out[i] = *value as f64;
        }
        out
    }
}

/// Last known GNSS position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GnssFix {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
}

impl GnssFix {
    /// Build from the 1e-7 degree integers u-blox receivers report.
    pub fn from_e7(latitude_e7: i32, longitude_e7: i32) -> Self {
        Self {
            latitude_deg: latitude_e7 as f64 / 1e7,
            longitude_deg: longitude_e7 as f64 / 1e7,
        }
    }
}

impl SensorReadings<2> for GnssFix {
    const PRECISION: [usize; 2] = [7, 7];

    fn to_array(&self) -> [f64; 2] {
        [self.latitude_deg, self.longitude_deg]
    }
}
