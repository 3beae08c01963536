//! Hardware initialization for the logger board
//!
//! Pin assignments follow the M5Stack CoreS3: sensors on the Port A I2C
//! header, the SD card slot on SPI2 and the command console on UART0.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use esp_hal::delay::Delay;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_hal::{Async, Blocking};
use static_cell::StaticCell;
use telem_core::shared_i2c::SharedI2c;
use telem_core::storage::{FixedClock, SdCardStore};

use crate::serial::UartConsole;

pub type AsyncI2cBus = I2c<'static, Async>;
pub type I2cBusMutex = AsyncMutex<CriticalSectionRawMutex, AsyncI2cBus>;
pub type SharedBus = SharedI2c<'static, CriticalSectionRawMutex, AsyncI2cBus>;

pub type SdSpiDevice = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, NoDelay>;
pub type SdStore = SdCardStore<SdSpiDevice, Delay, FixedClock>;

const CONSOLE_BAUD: u32 = 115_200;

/// Create the sensor I2C bus (400 kHz) and park it behind a mutex so every
/// driver can hold its own [`SharedBus`] handle.
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO2<'static>,
    scl: esp_hal::peripherals::GPIO1<'static>,
) -> &'static I2cBusMutex {
    static I2C0_BUS: StaticCell<I2cBusMutex> = StaticCell::new();

    let i2c = I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("I2C0 configuration rejected")
    .with_sda(sda)
    .with_scl(scl)
    .into_async();

    I2C0_BUS.init(AsyncMutex::new(i2c))
}

/// Build the SD card store on SPI2. The card itself is not touched until the
/// first mount.
pub fn create_sd_store(
    spi2: esp_hal::peripherals::SPI2<'static>,
    sck: esp_hal::peripherals::GPIO36<'static>,
    mosi: esp_hal::peripherals::GPIO37<'static>,
    miso: esp_hal::peripherals::GPIO35<'static>,
    cs: esp_hal::peripherals::GPIO4<'static>,
) -> SdStore {
    let spi_bus = Spi::new(
        spi2,
        SpiConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("SPI2 configuration rejected")
    .with_sck(sck)
    .with_mosi(mosi)
    .with_miso(miso);

    let cs = Output::new(cs, Level::High, OutputConfig::default());
    let spi_device =
        ExclusiveDevice::new_no_delay(spi_bus, cs).expect("SD card chip select unusable");

    let sd_card = embedded_sdmmc::SdCard::new(spi_device, Delay::new());
    SdCardStore::new(sd_card, FixedClock::default())
}

/// Open the command console on UART0 (115200 8N1).
pub fn create_console_uart(
    uart0: esp_hal::peripherals::UART0<'static>,
    tx: esp_hal::peripherals::GPIO43<'static>,
    rx: esp_hal::peripherals::GPIO44<'static>,
) -> UartConsole {
    let uart = Uart::new(uart0, UartConfig::default().with_baudrate(CONSOLE_BAUD))
        .expect("UART0 configuration rejected")
        .with_tx(tx)
        .with_rx(rx)
        .into_async();

    UartConsole::new(uart)
}
