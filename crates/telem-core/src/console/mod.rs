//! Line-oriented serial console.
//!
//! The console never blocks waiting for input: each poll only consumes bytes
//! the port already has, up to and including one newline, so at most one
//! command is handled per poll and a partial line carries over to the next.

pub mod command;
pub mod dispatch;

pub use command::Command;
pub use dispatch::{USAGE, dispatch};

use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use heapless::{String, Vec};
use thiserror_no_std::Error;

/// Longest accepted command line, excluding the newline.
pub const LINE_CAPACITY: usize = 128;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("serial port error: {0:?}")]
    Io(embedded_io::ErrorKind),
}

fn io_error<E: embedded_io::Error>(e: E) -> ConsoleError {
    ConsoleError::Io(e.kind())
}

/// A complete input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String<LINE_CAPACITY>),
    /// The line did not fit and was discarded up to its newline.
    TooLong,
    /// The line was not valid UTF-8.
    Garbled,
}

#[derive(Default)]
struct LineBuffer {
    bytes: Vec<u8, LINE_CAPACITY>,
    overflowed: bool,
}

impl LineBuffer {
    fn push(&mut self, byte: u8) -> Option<Line> {
        match byte {
            b'\n' => {
                let line = if self.overflowed {
                    Line::TooLong
                } else {
                    match core::str::from_utf8(&self.bytes) {
                        Ok(text) => String::try_from(text).map_or(Line::TooLong, Line::Text),
                        Err(_) => Line::Garbled,
                    }
                };
                self.bytes.clear();
                self.overflowed = false;
                Some(line)
            }
            b'\r' => None,
            _ => {
                if self.bytes.push(byte).is_err() {
                    self.overflowed = true;
                }
                None
            }
        }
    }
}

/// The serial side of the dispatcher: reads lines, writes `\r\n`-terminated
/// replies.
pub struct Console<P> {
    port: P,
    line: LineBuffer,
}

impl<P> Console<P>
where
    P: Read + Write + ReadReady,
{
    pub fn new(port: P) -> Self {
        Self {
            port,
            line: LineBuffer::default(),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume ready bytes until a newline. Returns `None` when the port ran
    /// dry first; the partial line is kept for the next poll.
    pub async fn poll_line(&mut self) -> Result<Option<Line>, ConsoleError> {
        let mut byte = [0u8; 1];
        while self.port.read_ready().map_err(io_error)? {
            if self.port.read(&mut byte).await.map_err(io_error)? == 0 {
                break;
            }
            if let Some(line) = self.line.push(byte[0]) {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Write raw bytes without a line ending.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ConsoleError> {
        self.port.write_all(bytes).await.map_err(io_error)
    }

    /// Write `text` followed by `\r\n` and flush.
    pub async fn reply(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.write_raw(text.as_bytes()).await?;
        self.write_raw(b"\r\n").await?;
        self.port.flush().await.map_err(io_error)
    }

    /// Format a reply into a bounded buffer and send it. Text that does not
    /// fit is cut short.
    pub async fn reply_fmt(&mut self, args: core::fmt::Arguments<'_>) -> Result<(), ConsoleError> {
        let mut text = String::<192>::new();
        let _ = core::fmt::write(&mut text, args);
        self.reply(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSerial;
    use embassy_futures::block_on;

    fn text(line: &str) -> Option<Line> {
        Some(Line::Text(String::try_from(line).unwrap()))
    }

    #[test]
    fn nothing_ready_is_a_no_op() {
        let mut console = Console::new(FakeSerial::default());
        assert_eq!(block_on(console.poll_line()), Ok(None));
        assert!(console.port().output.is_empty());
    }

    #[test]
    fn one_line_per_poll() {
        let mut console = Console::new(FakeSerial::default());
        console.port_mut().type_line("stop");
        console.port_mut().type_line("start");

        assert_eq!(block_on(console.poll_line()), Ok(text("stop")));
        assert_eq!(console.port().input.len(), "start\n".len());
        assert_eq!(block_on(console.poll_line()), Ok(text("start")));
        assert_eq!(block_on(console.poll_line()), Ok(None));
    }

    #[test]
    fn partial_line_carries_over() {
        let mut console = Console::new(FakeSerial::default());
        console.port_mut().input.extend(b"wri");
        assert_eq!(block_on(console.poll_line()), Ok(None));
        console.port_mut().input.extend(b"te x\r\n");
        assert_eq!(block_on(console.poll_line()), Ok(text("write x")));
    }

    #[test]
    fn overlong_line_is_discarded_up_to_newline() {
        let mut console = Console::new(FakeSerial::default());
        let long = "x".repeat(LINE_CAPACITY + 10);
        console.port_mut().type_line(&long);
        console.port_mut().type_line("read");

        assert_eq!(block_on(console.poll_line()), Ok(Some(Line::TooLong)));
        assert_eq!(block_on(console.poll_line()), Ok(text("read")));
    }

    #[test]
    fn line_of_exact_capacity_fits() {
        let mut console = Console::new(FakeSerial::default());
        let exact = "y".repeat(LINE_CAPACITY);
        console.port_mut().type_line(&exact);
        assert_eq!(block_on(console.poll_line()), Ok(text(&exact)));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut console = Console::new(FakeSerial::default());
        console.port_mut().input.extend([0xFF, 0xFE, b'\n']);
        assert_eq!(block_on(console.poll_line()), Ok(Some(Line::Garbled)));
    }

    #[test]
    fn replies_end_with_crlf() {
        let mut console = Console::new(FakeSerial::default());
        block_on(console.reply("Logging stopped.")).unwrap();
        block_on(console.reply_fmt(format_args!("Wrote: {}", "abc"))).unwrap();
        assert_eq!(
            console.port().output_str(),
            "Logging stopped.\r\nWrote: abc\r\n"
        );
    }
}
