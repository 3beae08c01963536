//! Host-side fakes shared by the unit tests.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{self, I2c, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Nack;

impl i2c::Error for Nack {
    fn kind(&self) -> i2c::ErrorKind {
        i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
    }
}

/// A register-mapped I2C target. Writes auto-increment from the register in
/// the first byte; reads auto-increment from the last addressed register.
pub(crate) struct FakeDevice {
    pub(crate) registers: [u8; 256],
    pointer: u8,
    /// When set, the device behaves like a u-blox DDC port: 0xFD/0xFE report
    /// the pending byte count (big-endian) and 0xFF drains this queue.
    pub(crate) stream: Option<VecDeque<u8>>,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self {
            registers: [0; 256],
            pointer: 0,
            stream: None,
        }
    }

    pub(crate) fn streaming() -> Self {
        Self {
            stream: Some(VecDeque::new()),
            ..Self::new()
        }
    }

    fn read_from_pointer(&mut self, buf: &mut [u8]) {
        if let Some(stream) = self.stream.as_mut() {
            match self.pointer {
                0xFD => {
                    let len = (stream.len() as u16).to_be_bytes();
                    for (i, byte) in buf.iter_mut().enumerate() {
                        *byte = len.get(i).copied().unwrap_or(0);
                    }
                }
                _ => {
                    for byte in buf.iter_mut() {
                        *byte = stream.pop_front().unwrap_or(0xFF);
                    }
                }
            }
            return;
        }

        for byte in buf.iter_mut() {
            *byte = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn write_at_pointer(&mut self, bytes: &[u8]) {
        let Some((&register, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = register;
        if self.stream.is_some() {
            return;
        }
        for (i, value) in data.iter().enumerate() {
            self.registers[register.wrapping_add(i as u8) as usize] = *value;
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeI2c {
    pub(crate) devices: BTreeMap<u8, FakeDevice>,
    /// Every write, as (address, bytes), in order.
    pub(crate) writes: Vec<(u8, Vec<u8>)>,
    /// Number of further transactions to NACK regardless of address.
    pub(crate) fail_next: usize,
}

impl FakeI2c {
    pub(crate) fn with_device(mut self, address: u8, device: FakeDevice) -> Self {
        self.devices.insert(address, device);
        self
    }

    pub(crate) fn device(&mut self, address: u8) -> &mut FakeDevice {
        self.devices.get_mut(&address).expect("no fake device at address")
    }

    /// Writes that set `register` on `address` to some value, in order.
    pub(crate) fn register_writes(&self, address: u8, register: u8) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(a, bytes)| *a == address && bytes.len() >= 2 && bytes[0] == register)
            .map(|(_, bytes)| bytes[1])
            .collect()
    }

    fn target(&mut self, address: u8) -> Result<&mut FakeDevice, Nack> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(Nack);
        }
        self.devices.get_mut(&address).ok_or(Nack)
    }
}

impl i2c::ErrorType for FakeI2c {
    type Error = Nack;
}

impl I2c for FakeI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.target(address)?;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    self.writes.push((address, bytes.to_vec()));
                    self.devices
                        .get_mut(&address)
                        .ok_or(Nack)?
                        .write_at_pointer(bytes);
                }
                Operation::Read(buf) => {
                    self.devices
                        .get_mut(&address)
                        .ok_or(Nack)?
                        .read_from_pointer(buf);
                }
            }
        }
        Ok(())
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub(crate) struct RecordingDelay {
    pub(crate) delays_ms: Vec<u32>,
    pub(crate) total_ns: u64,
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
        self.total_ns += ms as u64 * 1_000_000;
    }
}

/// Serial port double: bytes queued in `input` are readable, everything
/// written lands in `output`.
#[derive(Default)]
pub(crate) struct FakeSerial {
    pub(crate) input: VecDeque<u8>,
    pub(crate) output: Vec<u8>,
}

impl FakeSerial {
    pub(crate) fn type_line(&mut self, line: &str) {
        self.input.extend(line.as_bytes());
        self.input.push_back(b'\n');
    }

    pub(crate) fn output_str(&self) -> &str {
        core::str::from_utf8(&self.output).expect("console output is not utf-8")
    }

    pub(crate) fn take_output(&mut self) -> alloc::string::String {
        let text = alloc::string::String::from(self.output_str());
        self.output.clear();
        text
    }
}

impl embedded_io::ErrorType for FakeSerial {
    type Error = Infallible;
}

impl embedded_io::ReadReady for FakeSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.input.is_empty())
    }
}

impl embedded_io_async::Read for FakeSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        while count < buf.len() {
            match self.input.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl embedded_io_async::Write for FakeSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
