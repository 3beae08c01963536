//! ICM-20948 9-axis IMU driver (accelerometer, gyroscope, AK09916 magnetometer).
//!
//! The magnetometer is reached through the IMU's I2C bypass mux, so all three
//! parts are read directly over the host bus. Full-scale ranges are the
//! power-on defaults: +/-2 g and +/-250 dps.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{error, info, warn};

use super::{ImuReading, RetryPolicy, Sensor, SensorError};

/// AD0 pulled high, as on most breakout boards.
pub const DEFAULT_ADDRESS: u8 = 0x69;
pub const MAG_ADDRESS: u8 = 0x0C;

const SENSOR: &str = "ICM-20948";

const WHO_AM_I_VALUE: u8 = 0xEA;
const MAG_WIA2_VALUE: u8 = 0x09;

// User bank 0
const REG_WHO_AM_I: u8 = 0x00;
const REG_USER_CTRL: u8 = 0x03;
const REG_PWR_MGMT_1: u8 = 0x06;
const REG_PWR_MGMT_2: u8 = 0x07;
const REG_INT_PIN_CFG: u8 = 0x0F;
const REG_INT_ENABLE_1: u8 = 0x11;
const REG_INT_STATUS_1: u8 = 0x1A;
const REG_ACCEL_XOUT_H: u8 = 0x2D;
const REG_BANK_SEL: u8 = 0x7F;

// AK09916
const MAG_WIA2: u8 = 0x01;
const MAG_HXL: u8 = 0x11;
const MAG_CNTL2: u8 = 0x31;

const PWR_DEVICE_RESET: u8 = 0x80;
const PWR_CLKSEL_AUTO: u8 = 0x01;
const INT_PIN_BYPASS_EN: u8 = 0x02;
const RAW_DATA_0_RDY: u8 = 0x01;
const MAG_CONTINUOUS_100HZ: u8 = 0x08;

const RESET_SETTLE_MS: u32 = 50;
const WAKE_SETTLE_MS: u32 = 10;

const ACCEL_LSB_PER_MG: f32 = 16.384;
const GYRO_LSB_PER_DPS: f32 = 131.0;
const MAG_UT_PER_LSB: f32 = 0.15;

pub struct Icm20948<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    ready: bool,
}

impl<I: I2c, D: DelayNs> Icm20948<I, D> {
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            ready: false,
        }
    }

    /// Keep calling [`Self::begin`] until the chip reports ready, sleeping
    /// between attempts as `policy` dictates. Returns the number of attempts
    /// used, or `InitializationFailed` once the policy is exhausted.
    pub async fn init_with_retry(&mut self, policy: &RetryPolicy) -> Result<u32, SensorError> {
        let mut backoff = policy.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.begin().await {
                Ok(()) => {
                    info!("{} initialized after {} attempt(s)", SENSOR, attempt);
                    return Ok(attempt);
                }
                Err(e) => match backoff.next() {
                    Some(delay_ms) => {
                        warn!("{}: {}, trying again in {} ms", SENSOR, e, delay_ms);
                        self.delay.delay_ms(delay_ms).await;
                    }
                    None => {
                        error!("{}: giving up after {} attempt(s): {}", SENSOR, attempt, e);
                        return Err(SensorError::InitializationFailed {
                            sensor: SENSOR,
                            details: "device not ready after retry limit",
                        });
                    }
                },
            }
        }
    }

    /// One bring-up attempt: identify, reset, wake, enable the data-ready
    /// flag and start the magnetometer.
    pub async fn begin(&mut self) -> Result<(), SensorError> {
        self.ready = false;
        self.write(self.address, REG_BANK_SEL, 0).await?;

        let who_am_i = self.read_register(self.address, REG_WHO_AM_I).await?;
        if who_am_i != WHO_AM_I_VALUE {
            return Err(SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "unexpected WHO_AM_I",
            });
        }

        self.write(self.address, REG_PWR_MGMT_1, PWR_DEVICE_RESET)
            .await?;
        self.delay.delay_ms(RESET_SETTLE_MS).await;
        self.write(self.address, REG_PWR_MGMT_1, PWR_CLKSEL_AUTO)
            .await?;
        self.delay.delay_ms(WAKE_SETTLE_MS).await;
        self.write(self.address, REG_PWR_MGMT_2, 0x00).await?;
        self.write(self.address, REG_INT_ENABLE_1, RAW_DATA_0_RDY)
            .await?;

        // Hand the auxiliary bus to the host so the AK09916 answers directly.
        self.write(self.address, REG_USER_CTRL, 0x00).await?;
        self.write(self.address, REG_INT_PIN_CFG, INT_PIN_BYPASS_EN)
            .await?;

        let wia2 = self.read_register(MAG_ADDRESS, MAG_WIA2).await?;
        if wia2 != MAG_WIA2_VALUE {
            return Err(SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "magnetometer not found behind bypass",
            });
        }
        self.write(MAG_ADDRESS, MAG_CNTL2, MAG_CONTINUOUS_100HZ)
            .await?;

        self.ready = true;
        Ok(())
    }

    /// Whether the chip has latched a new accelerometer/gyroscope sample.
    pub async fn data_ready(&mut self) -> Result<bool, SensorError> {
        let status = self.read_register(self.address, REG_INT_STATUS_1).await?;
        Ok(status & RAW_DATA_0_RDY != 0)
    }

    async fn write(&mut self, address: u8, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(address, &[register, value])
            .await
            .map_err(|_| SensorError::I2cError {
                sensor: SENSOR,
                address,
            })
    }

    async fn read_register(&mut self, address: u8, register: u8) -> Result<u8, SensorError> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(address, &[register], &mut value)
            .await
            .map_err(|_| SensorError::I2cError {
                sensor: SENSOR,
                address,
            })?;
        Ok(value[0])
    }
}

impl<I: I2c, D: DelayNs> Sensor<9> for Icm20948<I, D> {
    type Readings = ImuReading;

    const NAME: &'static str = SENSOR;

    async fn read(&mut self) -> Result<Option<ImuReading>, SensorError> {
        if !self.ready || !self.data_ready().await? {
            return Ok(None);
        }

        let mut raw = [0u8; 12];
        self.i2c
            .write_read(self.address, &[REG_ACCEL_XOUT_H], &mut raw)
            .await
            .map_err(|_| SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "read accelerometer and gyroscope",
                details: "I2C communication error",
            })?;

        // HXL..HZH, TMPS, ST2. Reading through ST2 releases the data latch.
        let mut mag = [0u8; 8];
        self.i2c
            .write_read(MAG_ADDRESS, &[MAG_HXL], &mut mag)
            .await
            .map_err(|_| SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "read magnetometer",
                details: "I2C communication error",
            })?;

        let be = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]) as f32;
        let le = |i: usize| i16::from_le_bytes([mag[i], mag[i + 1]]) as f32;

        Ok(Some(ImuReading {
            accel_mg: [
                be(0) / ACCEL_LSB_PER_MG,
                be(2) / ACCEL_LSB_PER_MG,
                be(4) / ACCEL_LSB_PER_MG,
            ],
            gyro_dps: [
                be(6) / GYRO_LSB_PER_DPS,
                be(8) / GYRO_LSB_PER_DPS,
                be(10) / GYRO_LSB_PER_DPS,
            ],
            mag_ut: [
                le(0) * MAG_UT_PER_LSB,
                le(2) * MAG_UT_PER_LSB,
                le(4) * MAG_UT_PER_LSB,
            ],
        }))
    }
}
