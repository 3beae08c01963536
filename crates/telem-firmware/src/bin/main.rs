#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};
use telem_core::config::{
    KEY_AUTOSTART, KEY_LAYOUT, KEY_LOG_FILE, KEY_SAMPLE_INTERVAL_MS, KEY_SEA_LEVEL_HPA,
    LoggerConfig,
};
use telem_core::console::Console;
use telem_core::storage::{LogStore, StorageWriter};
use telem_firmware::app_state::{
    Station, create_console_uart, create_i2c_bus, create_sd_store, init_sensors,
};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Settings baked in by build.rs from the environment or `.env`.
const BUILD_OVERRIDES: [(&str, Option<&str>); 5] = [
    (KEY_LOG_FILE, option_env!("TELEM_LOG_FILE")),
    (KEY_SEA_LEVEL_HPA, option_env!("TELEM_SEA_LEVEL_HPA")),
    (KEY_SAMPLE_INTERVAL_MS, option_env!("TELEM_SAMPLE_INTERVAL_MS")),
    (KEY_LAYOUT, option_env!("TELEM_LAYOUT")),
    (KEY_AUTOSTART, option_env!("TELEM_AUTOSTART")),
];

fn uptime_ms() -> u64 {
    Instant::now().as_millis()
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let mut config = LoggerConfig::default();
    config.apply_overrides(BUILD_OVERRIDES);

    // 1. Storage first: the card may carry a config that changes everything else.
    let mut store = create_sd_store(
        peripherals.SPI2,
        peripherals.GPIO36,
        peripherals.GPIO37,
        peripherals.GPIO35,
        peripherals.GPIO4,
    );
    match store.mount() {
        Ok(()) => config.merge_from_store(&mut store),
        Err(e) => warn!("SD card not available at boot: {}", e),
    }

    // 2. Sensors on the shared I2C bus.
    let i2c_bus = create_i2c_bus(peripherals.I2C0, peripherals.GPIO2, peripherals.GPIO1);
    let sensors = init_sensors(i2c_bus, &config).await;

    // 3. Console and the logging session.
    let console = Console::new(create_console_uart(
        peripherals.UART0,
        peripherals.GPIO43,
        peripherals.GPIO44,
    ));
    let writer = StorageWriter::new(store, &config.log_file, config.layout.header())
        .expect("log file name was validated with the config");

    let mut station = Station::new(console, writer, sensors, config.layout);
    if let Err(e) = station.initialize(uptime_ms(), config.autostart) {
        error!("{}; commands will report storage errors until a card is usable", e);
    }

    info!(
        "Logging {} every {} ms; send start, stop, continue, read or write <text>",
        config.log_file, config.sample_interval_ms
    );

    let sample_interval = Duration::from_millis(config.sample_interval_ms as u64);
    let console_poll = Duration::from_millis(config.console_poll_ms as u64);
    let mut next_sample = Instant::now();

    loop {
        let now = Instant::now();
        if now >= next_sample {
            if let Err(e) = station.tick(now.as_millis()).await {
                error!("{}", e);
            }

            next_sample += sample_interval;
            if next_sample < now {
                // Fell behind (slow SD write); skip missed slots instead of bursting.
                next_sample = now + sample_interval;
            }
        } else if let Err(e) = station.poll_console(now.as_millis()).await {
            error!("{}", e);
        }

        Timer::after(console_poll).await;
    }
}
