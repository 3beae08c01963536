use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use log::{info, warn};

use super::{Command, Console, ConsoleError, LINE_CAPACITY, Line};
use crate::storage::{LogStore, StorageWriter, WriteOutcome};

pub const USAGE: &str = "Unknown command. Use: start, stop, continue, read, write <text>";

const READ_CHUNK: usize = 64;

/// Handle at most one pending console command. A poll with no complete line
/// waiting does nothing.
pub async fn dispatch<P, S>(
    console: &mut Console<P>,
    writer: &mut StorageWriter<S>,
    now_ms: u64,
) -> Result<(), ConsoleError>
where
    P: Read + Write + ReadReady,
    S: LogStore,
{
    let text = match console.poll_line().await? {
        None => return Ok(()),
        Some(Line::Text(text)) => text,
        Some(Line::TooLong) => {
            warn!("Discarded console line longer than {} bytes", LINE_CAPACITY);
            return console
                .reply_fmt(format_args!(
                    "Command too long (max {} characters).",
                    LINE_CAPACITY
                ))
                .await;
        }
        Some(Line::Garbled) => return console.reply(USAGE).await,
    };

    let Some(command) = Command::parse(&text) else {
        return Ok(());
    };
    info!("Console command: {:?}", command);

    match command {
        Command::Start => match writer.start(now_ms) {
            Ok(()) => {
                console
                    .reply("New logging started. File cleared. Timestamp reset to 0.")
                    .await
            }
            Err(e) => {
                console
                    .reply_fmt(format_args!("Error creating new log file: {}", e))
                    .await
            }
        },
        Command::Stop => {
            writer.stop();
            console.reply("Logging stopped.").await
        }
        Command::Continue => match writer.continue_logging() {
            Ok(()) => console.reply("Logging continued.").await,
            Err(e) => {
                console
                    .reply_fmt(format_args!("Failed to reopen log file: {}", e))
                    .await
            }
        },
        Command::Read => stream_log(console, writer).await,
        Command::Write(payload) => match writer.write(payload) {
            Ok(WriteOutcome::Written) => console.reply_fmt(format_args!("Wrote: {}", payload)).await,
            Ok(WriteOutcome::NotLogging) => console.reply("Not logging. Cannot write.").await,
            Err(e) => console.reply_fmt(format_args!("Write failed: {}", e)).await,
        },
        Command::Unknown => console.reply(USAGE).await,
    }
}

/// Copy the log file to the console chunk by chunk, between banner lines.
async fn stream_log<P, S>(
    console: &mut Console<P>,
    writer: &mut StorageWriter<S>,
) -> Result<(), ConsoleError>
where
    P: Read + Write + ReadReady,
    S: LogStore,
{
    let mut buf = [0u8; READ_CHUNK];
    let mut offset = 0u32;

    let first = match writer.read_chunk(offset, &mut buf) {
        Ok(n) => n,
        Err(e) => {
            return console
                .reply_fmt(format_args!("Error opening log file for reading: {}", e))
                .await;
        }
    };

    console
        .reply_fmt(format_args!("----- Contents of {} -----", writer.file_path()))
        .await?;

    let mut n = first;
    while n > 0 {
        console.write_raw(&buf[..n]).await?;
        offset += n as u32;
        n = match writer.read_chunk(offset, &mut buf) {
            Ok(n) => n,
            Err(e) => {
                console.write_raw(b"\r\n").await?;
                return console.reply_fmt(format_args!("Read failed: {}", e)).await;
            }
        };
    }

    console.write_raw(b"\r\n").await?;
    console.reply("----- End of file -----").await
}
