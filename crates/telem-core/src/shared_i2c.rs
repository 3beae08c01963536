//! One I2C bus, several drivers.
//!
//! The barometer, IMU and GNSS receiver sit on the same bus and each driver
//! wants to own an `I2c`. [`SharedI2c`] is a cheap handle that locks an
//! embassy `Mutex` around every call, so a transaction is never interleaved
//! with another device's even when the executor switches tasks mid-transfer.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

/// A per-device handle to a bus behind an async mutex.
///
/// ```ignore
/// static I2C_BUS: StaticCell<Mutex<NoopRawMutex, I2c<'static, Async>>> = StaticCell::new();
/// let bus = I2C_BUS.init(Mutex::new(i2c));
/// let barometer = Bmp280::new(SharedI2c::new(bus), Delay, bmp280::DEFAULT_ADDRESS, 1013.25);
/// let gnss = UbloxGnss::new(SharedI2c::new(bus), gnss::DEFAULT_ADDRESS);
/// ```
pub struct SharedI2c<'a, M: RawMutex, T> {
    bus: &'a Mutex<M, T>,
}

impl<'a, M: RawMutex, T> SharedI2c<'a, M, T> {
    #[inline]
    pub const fn new(bus: &'a Mutex<M, T>) -> Self {
        Self { bus }
    }
}

impl<M: RawMutex, T> Clone for SharedI2c<'_, M, T> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

impl<M: RawMutex, T: ErrorType> ErrorType for SharedI2c<'_, M, T> {
    type Error = T::Error;
}

impl<M: RawMutex, T: I2c> I2c for SharedI2c<'_, M, T> {
    #[inline]
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.lock().await.read(address, read).await
    }

    #[inline]
    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.bus.lock().await.write(address, write).await
    }

    /// The register pointer write and the read happen under one lock, so no
    /// other device can move the pointer in between.
    #[inline]
    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.bus.lock().await.write_read(address, write, read).await
    }

    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.bus.lock().await.transaction(address, operations).await
    }
}
