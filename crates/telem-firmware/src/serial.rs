//! Adapter from the esp-hal UART driver to the `embedded-io` traits the
//! console is written against.

use esp_hal::Async;
use esp_hal::uart::Uart;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    #[error("UART receive error")]
    Rx,
    #[error("UART transmit error")]
    Tx,
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

pub struct UartConsole {
    uart: Uart<'static, Async>,
}

impl UartConsole {
    pub fn new(uart: Uart<'static, Async>) -> Self {
        Self { uart }
    }
}

impl embedded_io::ErrorType for UartConsole {
    type Error = SerialError;
}

impl embedded_io::ReadReady for UartConsole {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.uart.read_ready())
    }
}

impl embedded_io_async::Read for UartConsole {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.uart
            .read_async(buf)
            .await
            .map_err(|_| SerialError::Rx)
    }
}

impl embedded_io_async::Write for UartConsole {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.uart
            .write_async(buf)
            .await
            .map_err(|_| SerialError::Tx)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.uart.flush_async().await.map_err(|_| SerialError::Tx)
    }
}
