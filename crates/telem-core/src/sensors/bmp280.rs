//! BMP280 barometric pressure / temperature sensor driver.
//!
//! Runs the chip in forced mode: nothing is sampled until [`Sensor::read`]
//! asks for a conversion, which keeps the readings aligned with the log
//! cadence. Compensation uses the floating-point formulas from the Bosch
//! datasheet (section 8.1).

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::{BarometerReading, Sensor, SensorError};

pub const DEFAULT_ADDRESS: u8 = 0x77;
pub const SEA_LEVEL_PRESSURE_HPA: f32 = 1013.25;

const SENSOR: &str = "BMP280";
const CHIP_ID: u8 = 0x58;

const REG_CALIBRATION: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

const STATUS_MEASURING: u8 = 1 << 3;

// Temperature x2, pressure x16.
const OSRS_T_X2: u8 = 0b010;
const OSRS_P_X16: u8 = 0b101;
const MODE_SLEEP: u8 = 0b00;
const MODE_FORCED: u8 = 0b01;
// 500 ms standby (only used in normal mode), IIR filter x16.
const CONFIG_VALUE: u8 = (0b100 << 5) | (0b100 << 2);

const STATUS_POLL_INTERVAL_MS: u32 = 5;
const STATUS_POLL_LIMIT: u32 = 20;

/// Raw ADC value the chip reports for a disabled or skipped channel.
const ADC_SKIPPED: i32 = 0x80000;

/// Factory trimming parameters (dig_T1..dig_P9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Calibration {
    pub fn from_bytes(raw: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }

    /// Returns `(temperature_c, pressure_pa)`, or `None` when the pressure
    /// term degenerates (p1 == 0 or an out-of-range ADC value).
    pub fn compensate(&self, adc_t: i32, adc_p: i32) -> Option<(f64, f64)> {
        let adc_t = adc_t as f64;
        let t1 = self.t1 as f64;

        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * self.t2 as f64;
        let delta = adc_t / 131072.0 - t1 / 8192.0;
        let var2 = delta * delta * self.t3 as f64;
        let t_fine = var1 + var2;
        let temperature = t_fine / 5120.0;

        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * self.p6 as f64 / 32768.0;
        var2 += var1 * self.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + self.p4 as f64 * 65536.0;
        var1 = (self.p3 as f64 * var1 * var1 / 524288.0 + self.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.p1 as f64;
        if var1 == 0.0 {
            return None;
        }

        let mut pressure = 1048576.0 - adc_p as f64;
        pressure = (pressure - var2 / 4096.0) * 6250.0 / var1;
        let var1 = self.p9 as f64 * pressure * pressure / 2147483648.0;
        let var2 = pressure * self.p8 as f64 / 32768.0;
        pressure += (var1 + var2 + self.p7 as f64) / 16.0;

        Some((temperature, pressure))
    }
}

/// Altitude in metres for `pressure_pa`, relative to `sea_level_hpa`.
pub fn altitude_m(pressure_pa: f32, sea_level_hpa: f32) -> f32 {
    let ratio = (pressure_pa / 100.0) / sea_level_hpa;
    44330.0 * (1.0 - libm::powf(ratio, 0.1903))
}

pub struct Bmp280<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    sea_level_hpa: f32,
    calibration: Option<Calibration>,
}

impl<I: I2c, D: DelayNs> Bmp280<I, D> {
    pub fn new(i2c: I, delay: D, address: u8, sea_level_hpa: f32) -> Self {
        Self {
            i2c,
            delay,
            address,
            sea_level_hpa,
            calibration: None,
        }
    }

    /// Check the chip id, load the trimming parameters and configure forced
    /// mode sampling. Must succeed before [`Sensor::read`] returns data.
    pub async fn init(&mut self) -> Result<(), SensorError> {
        let mut id = [0u8; 1];
        self.i2c
            .write_read(self.address, &[REG_CHIP_ID], &mut id)
            .await
            .map_err(|e| {
                error!("BMP280 chip id read failed: {:?}", e);
                SensorError::I2cError {
                    sensor: SENSOR,
                    address: self.address,
                }
            })?;

        if id[0] != CHIP_ID {
            error!("BMP280 unexpected chip id {:#04x}", id[0]);
            return Err(SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "unexpected chip id, check wiring or address",
            });
        }

        let mut raw = [0u8; 24];
        self.i2c
            .write_read(self.address, &[REG_CALIBRATION], &mut raw)
            .await
            .map_err(|_| SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "could not read calibration block",
            })?;
        let calibration = Calibration::from_bytes(&raw);
        debug!("BMP280 calibration: {:?}", calibration);

        self.write_register(REG_CONFIG, CONFIG_VALUE).await?;
        self.write_register(REG_CTRL_MEAS, Self::ctrl_meas(MODE_SLEEP))
            .await?;

        self.calibration = Some(calibration);
        info!("BMP280 initialized at {:#04x}", self.address);
        Ok(())
    }

    const fn ctrl_meas(mode: u8) -> u8 {
        (OSRS_T_X2 << 5) | (OSRS_P_X16 << 2) | mode
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(|_| SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "write configuration",
                details: "I2C communication error",
            })
    }

    /// Start one conversion and wait for the chip to finish it.
    async fn take_forced_measurement(&mut self) -> Result<(), SensorError> {
        self.write_register(REG_CTRL_MEAS, Self::ctrl_meas(MODE_FORCED))
            .await?;

        for _ in 0..STATUS_POLL_LIMIT {
            self.delay.delay_ms(STATUS_POLL_INTERVAL_MS).await;

            let mut status = [0u8; 1];
            self.i2c
                .write_read(self.address, &[REG_STATUS], &mut status)
                .await
                .map_err(|_| SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation: "read status",
                    details: "I2C communication error",
                })?;
            if status[0] & STATUS_MEASURING == 0 {
                return Ok(());
            }
        }

        Err(SensorError::Timeout {
            sensor: SENSOR,
            operation: "finish forced measurement",
        })
    }
}

impl<I: I2c, D: DelayNs> Sensor<3> for Bmp280<I, D> {
    type Readings = BarometerReading;

    const NAME: &'static str = SENSOR;

    async fn read(&mut self) -> Result<Option<BarometerReading>, SensorError> {
        let Some(calibration) = self.calibration else {
            return Err(SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "read before init",
            });
        };

        self.take_forced_measurement().await?;

        let mut data = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_DATA], &mut data)
            .await
            .map_err(|_| SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "read measurement",
                details: "I2C communication error",
            })?;

        let adc_p = ((data[0] as i32) << 12) | ((data[1] as i32) << 4) | ((data[2] as i32) >> 4);
        let adc_t = ((data[3] as i32) << 12) | ((data[4] as i32) << 4) | ((data[5] as i32) >> 4);
        if adc_t == ADC_SKIPPED || adc_p == ADC_SKIPPED {
            return Err(SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "read measurement",
                details: "conversion skipped",
            });
        }

        let (temperature, pressure) =
            calibration
                .compensate(adc_t, adc_p)
                .ok_or(SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation: "compensate pressure",
                    details: "invalid calibration data",
                })?;

        let pressure_pa = pressure as f32;
        Ok(Some(BarometerReading {
            temperature_c: temperature as f32,
            pressure_pa,
            altitude_m: altitude_m(pressure_pa, self.sea_level_hpa),
        }))
    }
}
