//! CSV log records.
//!
//! A record is one comma-separated line with no escaping or framing. Sensors
//! that produced nothing this tick contribute `N/A` placeholders so the
//! columns stay aligned with the header.

use core::fmt::Write;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::sensors::{BarometerReading, GnssFix, ImuReading, SensorReadings};

pub const TELEMETRY_HEADER: &str = "Timestamp,GNSS_Lat,GNSS_Lon,Temperature,Pressure,Altitude";
pub const WITH_IMU_HEADER: &str = "Timestamp,GNSS_Lat,GNSS_Lon,Temperature,Pressure,Altitude,\
Accel_X,Accel_Y,Accel_Z,Gyro_X,Gyro_Y,Gyro_Z,Mag_X,Mag_Y,Mag_Z";

pub const NOT_AVAILABLE: &str = "N/A";

const IMU_FIELDS: usize = 9;

/// Longest line a record can hold.
pub const RECORD_CAPACITY: usize = 256;

/// Which columns are written after the timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordLayout {
    /// GNSS position and barometer.
    #[default]
    Telemetry,
    /// Telemetry followed by the nine IMU axes.
    WithImu,
}

impl RecordLayout {
    pub const fn header(self) -> &'static str {
        match self {
            Self::Telemetry => TELEMETRY_HEADER,
            Self::WithImu => WITH_IMU_HEADER,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("telemetry") {
            Some(Self::Telemetry)
        } else if name.eq_ignore_ascii_case("imu") || name.eq_ignore_ascii_case("with_imu") {
            Some(Self::WithImu)
        } else {
            None
        }
    }
}

/// Write the fields of `reading`, comma separated, each with its own precision.
pub fn write_fields<W, R, const COUNT: usize>(out: &mut W, reading: &R) -> core::fmt::Result
where
    W: Write,
    R: SensorReadings<COUNT>,
{
    for (i, (value, precision)) in reading
        .to_array()
        .iter()
        .zip(R::PRECISION.iter())
        .enumerate()
    {
        if i > 0 {
            out.write_char(',')?;
        }
        write!(out, "{:.*}", *precision, value)?;
    }
    Ok(())
}

/// Write `count` comma separated `N/A` placeholders.
pub fn write_placeholders<W: Write>(out: &mut W, count: usize) -> core::fmt::Result {
    for i in 0..count {
        if i > 0 {
            out.write_char(',')?;
        }
        out.write_str(NOT_AVAILABLE)?;
    }
    Ok(())
}

fn write_or_placeholders<W, R, const COUNT: usize>(
    out: &mut W,
    reading: Option<&R>,
) -> core::fmt::Result
where
    W: Write,
    R: SensorReadings<COUNT>,
{
    match reading {
        Some(reading) => write_fields(out, reading),
        None => write_placeholders(out, COUNT),
    }
}

/// `temperature,pressure,altitude`, or `N/A,N/A,N/A` when the read failed.
pub fn barometer_text(reading: Option<&BarometerReading>) -> String<48> {
    let mut text = String::new();
    let _ = write_or_placeholders(&mut text, reading);
    text
}

/// The nine IMU axes, or an empty string when no sample was ready.
pub fn imu_text(reading: Option<&ImuReading>) -> String<128> {
    let mut text = String::new();
    if let Some(reading) = reading {
        let _ = write_fields(&mut text, reading);
    }
    text
}

/// `latitude,longitude`, or `N/A,N/A` before the first fix.
pub fn gnss_text(fix: Option<&GnssFix>) -> String<32> {
    let mut text = String::new();
    let _ = write_or_placeholders(&mut text, fix);
    text
}

/// Everything sampled during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    pub gnss: Option<GnssFix>,
    pub barometer: Option<BarometerReading>,
    pub imu: Option<ImuReading>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    line: String<RECORD_CAPACITY>,
    truncated: bool,
}

impl LogRecord {
    pub fn build(layout: RecordLayout, timestamp_ms: u64, snapshot: &Snapshot) -> Self {
        let mut line = String::new();
        let result = Self::write_line(&mut line, layout, timestamp_ms, snapshot);
        Self {
            line,
            truncated: result.is_err(),
        }
    }

    fn write_line(
        line: &mut String<RECORD_CAPACITY>,
        layout: RecordLayout,
        timestamp_ms: u64,
        snapshot: &Snapshot,
    ) -> core::fmt::Result {
        write!(
            line,
            "{},{},{}",
            timestamp_ms,
            gnss_text(snapshot.gnss.as_ref()),
            barometer_text(snapshot.barometer.as_ref()),
        )?;
        if layout == RecordLayout::WithImu {
            line.write_char(',')?;
            // Keep the nine columns even when the IMU had nothing ready.
            let imu = imu_text(snapshot.imu.as_ref());
            if imu.is_empty() {
                write_placeholders(line, IMU_FIELDS)?;
            } else {
                line.write_str(&imu)?;
            }
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Set when a field did not fit and the line was cut short.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl core::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barometer() -> BarometerReading {
        BarometerReading {
            temperature_c: 25.08,
            pressure_pa: 100653.27,
            altitude_m: 55.97,
        }
    }

    fn imu() -> ImuReading {
        ImuReading {
            accel_mg: [1.0, -2.5, 1000.0],
            gyro_dps: [0.5, 0.0, -3.0],
            mag_ut: [12.0, -40.5, 7.25],
        }
    }

    #[test]
    fn failed_barometer_formats_as_placeholders() {
        assert_eq!(barometer_text(None).as_str(), "N/A,N/A,N/A");
    }

    #[test]
    fn barometer_uses_per_field_precision() {
        assert_eq!(barometer_text(Some(&barometer())).as_str(), "25.08,100653,55.97");
    }

    #[test]
    fn imu_not_ready_formats_as_empty() {
        assert_eq!(imu_text(None).as_str(), "");
    }

    #[test]
    fn imu_has_nine_fields() {
        let text = imu_text(Some(&imu()));
        assert_eq!(text.split(',').count(), 9);
        assert!(text.starts_with("1.00,-2.50,1000.00,0.50,"));
    }

    #[test]
    fn gnss_without_fix_is_placeholders() {
        assert_eq!(gnss_text(None).as_str(), "N/A,N/A");
        let fix = GnssFix::from_e7(321_234_567, -1_000_000);
        assert_eq!(gnss_text(Some(&fix)).as_str(), "32.1234567,-0.1000000");
    }

    #[test]
    fn telemetry_record_matches_header_columns() {
        let snapshot = Snapshot {
            gnss: None,
            barometer: Some(barometer()),
            imu: Some(imu()),
        };
        let record = LogRecord::build(RecordLayout::Telemetry, 1500, &snapshot);
        assert_eq!(record.as_str(), "1500,N/A,N/A,25.08,100653,55.97");
        assert_eq!(
            record.as_str().split(',').count(),
            TELEMETRY_HEADER.split(',').count()
        );
        assert!(!record.is_truncated());
    }

    #[test]
    fn imu_layout_pads_missing_sample() {
        let record = LogRecord::build(RecordLayout::WithImu, 0, &Snapshot::default());
        assert_eq!(
            record.as_str().split(',').count(),
            WITH_IMU_HEADER.split(',').count()
        );
        assert!(record.as_str().ends_with(",N/A,N/A,N/A"));
    }

    #[test]
    fn layout_names() {
        assert_eq!(RecordLayout::from_name("IMU"), Some(RecordLayout::WithImu));
        assert_eq!(
            RecordLayout::from_name("telemetry"),
            Some(RecordLayout::Telemetry)
        );
        assert_eq!(RecordLayout::from_name("csv"), None);
        assert!(RecordLayout::WithImu.header().starts_with(TELEMETRY_HEADER));
    }
}
