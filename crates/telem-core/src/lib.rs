//! Hardware-independent core library for telem-rs
//!
//! This crate contains all platform-agnostic logic for the flight telemetry
//! logger: sensor drivers written against `embedded-hal-async`, the CSV record
//! format, the SD card logging session, the serial command dispatcher and the
//! control loop that ties them together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app_state;
pub mod config;
pub mod console;
pub mod record;
pub mod sensors;
pub mod shared_i2c;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
