//! Bakes `TELEM_*` settings from the environment or a `.env` file into the
//! binary, where `option_env!` picks them up as config overrides.

use std::env;

const OVERRIDE_KEYS: [&str; 5] = [
    "TELEM_LOG_FILE",
    "TELEM_SEA_LEVEL_HPA",
    "TELEM_SAMPLE_INTERVAL_MS",
    "TELEM_LAYOUT",
    "TELEM_AUTOSTART",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    // A missing .env just means no overrides.
    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for key in OVERRIDE_KEYS {
        println!("cargo:rerun-if-env-changed={key}");
        if let Ok(value) = env::var(key) {
            println!("cargo:rustc-env={key}={value}");
        }
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
