//! Desktop simulator for the telem-rs flight logger.
//!
//! Runs the same [`Station`] loop as the firmware against a host directory
//! (the "SD card"), stdin/stdout (the serial console) and synthetic sensors
//! flying a scripted climb and descent.
//!
//! Type `start`, `stop`, `continue`, `read` or `write <text>` followed by
//! Enter. Settings come from the same `TELEM_*` variables the firmware build
//! reads, and `TELEM_SIM_DIR` picks the card directory (default `./sdcard`).

mod dir_store;
mod stdin_console;
mod synthetic;

use std::time::{Duration, Instant};

use embassy_futures::block_on;
use log::{debug, error, info, warn};

use telem_core::app_state::{Sensors, Station};
use telem_core::config::{LoggerConfig, OVERRIDE_KEYS};
use telem_core::console::Console;
use telem_core::storage::{LogStore, StorageWriter};

use dir_store::DirStore;
use stdin_console::StdinConsole;
use synthetic::{FlightClock, SyntheticBarometer, SyntheticGnss, SyntheticImu};

const DEFAULT_CARD_DIR: &str = "sdcard";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = LoggerConfig::default();
    let env: Vec<(&str, Option<String>)> = OVERRIDE_KEYS
        .iter()
        .map(|key| (*key, std::env::var(key).ok()))
        .collect();
    config.apply_overrides(env.iter().map(|(key, value)| (*key, value.as_deref())));

    let card_dir = std::env::var("TELEM_SIM_DIR").unwrap_or_else(|_| DEFAULT_CARD_DIR.into());
    let mut store = DirStore::new(&card_dir);
    match store.mount() {
        Ok(()) => config.merge_from_store(&mut store),
        Err(e) => warn!("Card directory {} unusable: {}", card_dir, e),
    }

    let clock = FlightClock::default();
    let sensors = Sensors {
        barometer: SyntheticBarometer::new(clock.clone(), config.sea_level_hpa),
        imu: SyntheticImu::new(clock.clone()),
        gnss: SyntheticGnss::new(clock.clone()),
    };

    let writer = match StorageWriter::new(store, &config.log_file, config.layout.header()) {
        Ok(writer) => writer,
        Err(e) => {
            error!("Log file name {:?} rejected: {}", config.log_file.as_str(), e);
            return;
        }
    };

    let started = Instant::now();
    let uptime_ms = || started.elapsed().as_millis() as u64;

    let mut station = Station::new(
        Console::new(StdinConsole::spawn()),
        writer,
        sensors,
        config.layout,
    );
    if let Err(e) = station.initialize(uptime_ms(), config.autostart) {
        error!("{}", e);
    }

    info!(
        "Simulating into {}/{} every {} ms",
        card_dir, config.log_file, config.sample_interval_ms
    );

    let sample_interval = Duration::from_millis(u64::from(config.sample_interval_ms));
    let console_poll = Duration::from_millis(u64::from(config.console_poll_ms));
    let mut next_sample = Instant::now();

    loop {
        let now = Instant::now();
        if now >= next_sample {
            clock.set_secs(started.elapsed().as_secs_f64());
            match block_on(station.tick(uptime_ms())) {
                Ok(tick) => debug!("{} ({:?})", tick.record, tick.outcome),
                Err(e) => error!("{}", e),
            }

            next_sample += sample_interval;
            if next_sample < now {
                next_sample = now + sample_interval;
            }
        } else if let Err(e) = block_on(station.poll_console(uptime_ms())) {
            error!("{}", e);
        }

        std::thread::sleep(console_poll);
    }
}
