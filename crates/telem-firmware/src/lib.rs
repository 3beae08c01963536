//! ESP32-S3 firmware-specific modules for telem-rs
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ESP32 peripheral initialization, the UART console adapter and the
//! concrete sensor wiring on the shared I2C bus.

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod serial;
