//! Terminal stand-in for the UART console.
//!
//! A reader thread forwards stdin bytes over a channel so the control loop
//! can poll for input without blocking, the same way the firmware checks the
//! UART FIFO.

use std::collections::VecDeque;
use std::io::{self, Read as _};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use embedded_io::{ErrorKind, ErrorType, ReadReady};
use embedded_io_async::{Read, Write};

pub struct StdinConsole<W> {
    input: Receiver<u8>,
    pending: VecDeque<u8>,
    output: W,
}

impl StdinConsole<io::Stdout> {
    /// Spawn the stdin reader thread and echo replies to stdout.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for byte in io::stdin().lock().bytes() {
                let Ok(byte) = byte else { break };
                if tx.send(byte).is_err() {
                    break;
                }
            }
        });
        Self::new(rx, io::stdout())
    }
}

impl<W: io::Write> StdinConsole<W> {
    pub fn new(input: Receiver<u8>, output: W) -> Self {
        Self {
            input,
            pending: VecDeque::new(),
            output,
        }
    }

    fn fill(&mut self) {
        loop {
            match self.input.try_recv() {
                Ok(byte) => self.pending.push_back(byte),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }
}

impl<W> ErrorType for StdinConsole<W> {
    type Error = ErrorKind;
}

impl<W: io::Write> ReadReady for StdinConsole<W> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.fill();
        Ok(!self.pending.is_empty())
    }
}

impl<W: io::Write> Read for StdinConsole<W> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.pending.is_empty() {
            // Only reached when the caller skipped read_ready; wait for input.
            let byte = self.input.recv().map_err(|_| ErrorKind::BrokenPipe)?;
            self.pending.push_back(byte);
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl<W: io::Write> Write for StdinConsole<W> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.write(buf).map_err(|_| ErrorKind::Other)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.output.flush().map_err(|_| ErrorKind::Other)
    }
}
