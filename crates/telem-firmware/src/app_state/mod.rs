//! Firmware-specific application state extensions
//!
//! Re-exports the hardware-independent app state from `telem_core` and
//! adds ESP32-specific hardware initialization and sensor wiring.

mod hardware;
mod sensors_state;

pub use hardware::*;
pub use sensors_state::*;

// Re-export all shared app state types from telem-core
pub use telem_core::app_state::*;
