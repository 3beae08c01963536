//! Synthetic sensors flying a scripted profile: climb, coast and a slow
//! descent, looping every few minutes.

use std::cell::Cell;
use std::rc::Rc;

use telem_core::sensors::{BarometerReading, GnssFix, ImuReading, Sensor, SensorError};

/// Length of one climb/coast/descent cycle in seconds.
const CYCLE_SECS: f64 = 300.0;
const APOGEE_M: f64 = 1200.0;
const LAUNCH_LAT_DEG: f64 = 47.6062;
const LAUNCH_LON_DEG: f64 = -122.3321;
/// GNSS takes this long to report a first fix.
const TIME_TO_FIX_SECS: f64 = 5.0;

/// Shared flight clock; every synthetic sensor reads the same instant.
#[derive(Clone, Default)]
pub struct FlightClock(Rc<Cell<f64>>);

impl FlightClock {
    pub fn set_secs(&self, secs: f64) {
        self.0.set(secs);
    }

    fn secs(&self) -> f64 {
        self.0.get()
    }

    /// Altitude above the launch site at the current instant.
    fn altitude_m(&self) -> f64 {
        let t = self.secs() % CYCLE_SECS;
        if t < 30.0 {
            APOGEE_M * (t / 30.0) * (t / 30.0)
        } else if t < 60.0 {
            APOGEE_M
        } else {
            APOGEE_M * (1.0 - (t - 60.0) / (CYCLE_SECS - 60.0))
        }
    }
}

pub struct SyntheticBarometer {
    clock: FlightClock,
    sea_level_hpa: f64,
}

impl SyntheticBarometer {
    pub fn new(clock: FlightClock, sea_level_hpa: f32) -> Self {
        Self {
            clock,
            sea_level_hpa: f64::from(sea_level_hpa),
        }
    }
}

impl Sensor<3> for SyntheticBarometer {
    type Readings = BarometerReading;
    const NAME: &'static str = "synthetic barometer";

    async fn read(&mut self) -> Result<Option<BarometerReading>, SensorError> {
        let altitude = self.clock.altitude_m();
        // Inverse of the international barometric formula.
        let pressure_hpa = self.sea_level_hpa * (1.0 - altitude / 44_330.0).powf(5.255);
        Ok(Some(BarometerReading {
            temperature_c: (15.0 - 0.0065 * altitude) as f32,
            pressure_pa: (pressure_hpa * 100.0) as f32,
            altitude_m: altitude as f32,
        }))
    }
}

pub struct SyntheticImu {
    clock: FlightClock,
}

impl SyntheticImu {
    pub fn new(clock: FlightClock) -> Self {
        Self { clock }
    }
}

impl Sensor<9> for SyntheticImu {
    type Readings = ImuReading;
    const NAME: &'static str = "synthetic IMU";

    async fn read(&mut self) -> Result<Option<ImuReading>, SensorError> {
        let t = self.clock.secs();
        let boost = if t % CYCLE_SECS < 30.0 { 2667.0 } else { 0.0 };
        let wobble = (t * 0.7).sin();
        Ok(Some(ImuReading {
            accel_mg: [
                (40.0 * wobble) as f32,
                (25.0 * (t * 1.3).cos()) as f32,
                (1000.0 + boost) as f32,
            ],
            gyro_dps: [(3.0 * wobble) as f32, (2.0 * (t * 0.4).cos()) as f32, 0.5],
            mag_ut: [
                (22.0 * (t * 0.05).cos()) as f32,
                (22.0 * (t * 0.05).sin()) as f32,
                -41.0,
            ],
        }))
    }
}

pub struct SyntheticGnss {
    clock: FlightClock,
}

impl SyntheticGnss {
    pub fn new(clock: FlightClock) -> Self {
        Self { clock }
    }
}

impl Sensor<2> for SyntheticGnss {
    type Readings = GnssFix;
    const NAME: &'static str = "synthetic GNSS";

    async fn read(&mut self) -> Result<Option<GnssFix>, SensorError> {
        let t = self.clock.secs();
        if t < TIME_TO_FIX_SECS {
            return Ok(None);
        }
        // Drift downwind while the flight goes on.
        let drift = (t % CYCLE_SECS) * 2.0e-5;
        Ok(Some(GnssFix {
            latitude_deg: LAUNCH_LAT_DEG + drift * 0.3,
            longitude_deg: LAUNCH_LON_DEG + drift,
        }))
    }
}
