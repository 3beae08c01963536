//! u-blox GNSS receiver over the DDC (I2C) port.
//!
//! Each read sends a NAV-PVT poll and drains whatever the receiver has queued
//! since the previous call, so the position returned is usually the answer to
//! the poll sent one tick earlier.

use embedded_hal_async::i2c::I2c;
use log::{debug, warn};

use super::ubx::{self, UbxParser};
use super::{GnssFix, Sensor, SensorError};

pub const DEFAULT_ADDRESS: u8 = 0x42;

const SENSOR: &str = "GNSS";

const REG_BYTES_AVAILABLE: u8 = 0xFD;
const REG_DATA_STREAM: u8 = 0xFF;

/// Upper bound on bytes drained per read so a chatty receiver cannot stall
/// the sampling loop.
const MAX_DRAIN_PER_READ: usize = 1024;
const CHUNK: usize = 64;

pub struct UbloxGnss<I> {
    i2c: I,
    address: u8,
    parser: UbxParser,
    last_fix: Option<GnssFix>,
}

impl<I: I2c> UbloxGnss<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            parser: UbxParser::new(),
            last_fix: None,
        }
    }

    /// Probe the receiver once. It must at least answer the length register.
    pub async fn init(&mut self) -> Result<(), SensorError> {
        self.bytes_available().await.map_err(|_| SensorError::InitializationFailed {
            sensor: SENSOR,
            details: "receiver did not answer on DDC",
        })?;
        Ok(())
    }

    async fn bytes_available(&mut self) -> Result<usize, SensorError> {
        let mut len = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_BYTES_AVAILABLE], &mut len)
            .await
            .map_err(|_| SensorError::I2cError {
                sensor: SENSOR,
                address: self.address,
            })?;
        Ok(u16::from_be_bytes(len) as usize)
    }

    async fn poll_nav_pvt(&mut self) -> Result<(), SensorError> {
        let frame = ubx::poll_frame(ubx::CLASS_NAV, ubx::ID_NAV_PVT);
        let mut message = [0u8; 1 + 8];
        message[0] = REG_DATA_STREAM;
        message[1..].copy_from_slice(&frame);
        self.i2c
            .write(self.address, &message)
            .await
            .map_err(|_| SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "poll NAV-PVT",
                details: "I2C communication error",
            })
    }

    async fn drain(&mut self) -> Result<(), SensorError> {
        let mut remaining = self.bytes_available().await?.min(MAX_DRAIN_PER_READ);
        let mut buf = [0u8; CHUNK];

        while remaining > 0 {
            let take = remaining.min(CHUNK);
            self.i2c
                .write_read(self.address, &[REG_DATA_STREAM], &mut buf[..take])
                .await
                .map_err(|_| SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation: "read data stream",
                    details: "I2C communication error",
                })?;
            remaining -= take;

            for byte in &buf[..take] {
                if let Some(pvt) = self.parser.push(*byte) {
                    debug!(
                        "NAV-PVT fix={} sats={} lat={} lon={}",
                        pvt.fix_type, pvt.satellites, pvt.latitude_e7, pvt.longitude_e7
                    );
                    if pvt.has_fix() {
                        self.last_fix = Some(GnssFix::from_e7(pvt.latitude_e7, pvt.longitude_e7));
                    }
                }
            }
        }
        Ok(())
    }
}

impl<I: I2c> Sensor<2> for UbloxGnss<I> {
    type Readings = GnssFix;

    const NAME: &'static str = SENSOR;

    async fn read(&mut self) -> Result<Option<GnssFix>, SensorError> {
        if let Err(e) = self.drain().await {
            warn!("{}: {}", SENSOR, e);
            return Err(e);
        }
        self.poll_nav_pvt().await?;
        Ok(self.last_fix)
    }
}
