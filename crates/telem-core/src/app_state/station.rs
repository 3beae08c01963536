//! The control loop body shared by the firmware and the simulator.

use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use log::{debug, error, warn};

use super::AppError;
use crate::console::{Console, dispatch};
use crate::record::{LogRecord, RecordLayout, Snapshot};
use crate::sensors::{BarometerReading, GnssFix, ImuReading, Sensor};
use crate::storage::{LogStore, StorageWriter, WriteOutcome};

/// The three sensor slots. Any of them may be `None` at runtime (chip
/// missing) and still satisfy the [`Sensor`] bounds.
pub struct Sensors<B, I, G> {
    pub barometer: B,
    pub imu: I,
    pub gnss: G,
}

/// What one sampling pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub record: LogRecord,
    pub outcome: WriteOutcome,
}

/// Everything the control loop owns: console, storage and sensors.
pub struct Station<P, S, B, I, G> {
    console: Console<P>,
    writer: StorageWriter<S>,
    sensors: Sensors<B, I, G>,
    layout: RecordLayout,
}

impl<P, S, B, I, G> Station<P, S, B, I, G>
where
    P: Read + Write + ReadReady,
    S: LogStore,
    B: Sensor<3, Readings = BarometerReading>,
    I: Sensor<9, Readings = ImuReading>,
    G: Sensor<2, Readings = GnssFix>,
{
    pub fn new(
        console: Console<P>,
        writer: StorageWriter<S>,
        sensors: Sensors<B, I, G>,
        layout: RecordLayout,
    ) -> Self {
        Self {
            console,
            writer,
            sensors,
            layout,
        }
    }

    pub fn writer(&self) -> &StorageWriter<S> {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut StorageWriter<S> {
        &mut self.writer
    }

    pub fn console_mut(&mut self) -> &mut Console<P> {
        &mut self.console
    }

    pub fn sensors_mut(&mut self) -> &mut Sensors<B, I, G> {
        &mut self.sensors
    }

    /// Bring storage up and optionally begin a fresh log. A storage failure
    /// is reported but the station keeps running without it.
    pub fn initialize(&mut self, now_ms: u64, autostart: bool) -> Result<(), AppError> {
        self.writer.initialize(now_ms)?;
        if autostart {
            self.writer.start(now_ms)?;
        }
        Ok(())
    }

    /// Handle at most one console command.
    pub async fn poll_console(&mut self, now_ms: u64) -> Result<(), AppError> {
        dispatch(&mut self.console, &mut self.writer, now_ms).await?;
        Ok(())
    }

    /// Read every sensor once. Failed reads become missing fields.
    pub async fn sample(&mut self) -> Snapshot {
        Snapshot {
            gnss: observe(&mut self.sensors.gnss).await,
            barometer: observe(&mut self.sensors.barometer).await,
            imu: observe(&mut self.sensors.imu).await,
        }
    }

    /// Format `snapshot` and append it if logging.
    pub fn record(&mut self, now_ms: u64, snapshot: &Snapshot) -> Result<Tick, AppError> {
        let record = LogRecord::build(self.layout, self.writer.timestamp_ms(now_ms), snapshot);
        if record.is_truncated() {
            warn!("Record truncated: {}", record);
        }
        debug!("{}", record);

        let outcome = self.writer.write(record.as_str())?;
        Ok(Tick { record, outcome })
    }

    /// One sampling pass: a console poll, a sample and a log write. A console
    /// failure is logged and does not cost the record.
    pub async fn tick(&mut self, now_ms: u64) -> Result<Tick, AppError> {
        if let Err(e) = self.poll_console(now_ms).await {
            error!("{}", e);
        }
        let snapshot = self.sample().await;
        self.record(now_ms, &snapshot)
    }
}

async fn observe<T, const COUNT: usize>(sensor: &mut T) -> Option<T::Readings>
where
    T: Sensor<COUNT>,
{
    match sensor.read().await {
        Ok(reading) => reading,
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{TELEMETRY_HEADER, WITH_IMU_HEADER};
    use crate::sensors::SensorError;
    use crate::storage::{LoggingState, MemoryStore};
    use crate::testing::FakeSerial;
    use alloc::string::String;
    use embassy_futures::block_on;

    /// Returns queued results in order, then repeats the last one.
    struct Scripted<R: Copy> {
        results: alloc::vec::Vec<Result<Option<R>, SensorError>>,
    }

    impl<R: Copy> Scripted<R> {
        fn always(result: Result<Option<R>, SensorError>) -> Self {
            Self {
                results: alloc::vec![result],
            }
        }

        fn next(&mut self) -> Result<Option<R>, SensorError> {
            if self.results.len() > 1 {
                self.results.remove(0)
            } else {
                self.results[0]
            }
        }
    }

    impl Sensor<3> for Scripted<BarometerReading> {
        type Readings = BarometerReading;
        const NAME: &'static str = "barometer";
        async fn read(&mut self) -> Result<Option<BarometerReading>, SensorError> {
            self.next()
        }
    }

    impl Sensor<9> for Scripted<ImuReading> {
        type Readings = ImuReading;
        const NAME: &'static str = "imu";
        async fn read(&mut self) -> Result<Option<ImuReading>, SensorError> {
            self.next()
        }
    }

    impl Sensor<2> for Scripted<GnssFix> {
        type Readings = GnssFix;
        const NAME: &'static str = "gnss";
        async fn read(&mut self) -> Result<Option<GnssFix>, SensorError> {
            self.next()
        }
    }

    type TestStation = Station<
        FakeSerial,
        MemoryStore,
        Scripted<BarometerReading>,
        Scripted<ImuReading>,
        Scripted<GnssFix>,
    >;

    const BARO: BarometerReading = BarometerReading {
        temperature_c: 21.5,
        pressure_pa: 101000.0,
        altitude_m: 27.5,
    };

    fn station(layout: RecordLayout, barometer: Scripted<BarometerReading>) -> TestStation {
        let writer = StorageWriter::new(MemoryStore::new(), "LOG.TXT", layout.header()).unwrap();
        let sensors = Sensors {
            barometer,
            imu: Scripted::always(Ok(None)),
            gnss: Scripted::always(Ok(None)),
        };
        let mut station = Station::new(Console::new(FakeSerial::default()), writer, sensors, layout);
        station.initialize(0, false).unwrap();
        station
    }

    fn log_contents(station: &TestStation) -> String {
        let bytes = station.writer().store().contents("LOG.TXT").unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn idle_tick_formats_but_does_not_write() {
        let mut station = station(RecordLayout::Telemetry, Scripted::always(Ok(Some(BARO))));
        let tick = block_on(station.tick(2_000)).unwrap();
        assert_eq!(tick.outcome, WriteOutcome::NotLogging);
        assert_eq!(tick.record.as_str(), "2000,N/A,N/A,21.50,101000,27.50");
        assert_eq!(log_contents(&station), alloc::format!("{}\n", TELEMETRY_HEADER));
    }

    #[test]
    fn start_command_then_ticks_append_relative_timestamps() {
        let mut station = station(RecordLayout::Telemetry, Scripted::always(Ok(Some(BARO))));
        station.console_mut().port_mut().type_line("start");

        let first = block_on(station.tick(5_000)).unwrap();
        assert_eq!(first.outcome, WriteOutcome::Written);
        assert!(first.record.as_str().starts_with("0,"));

        let second = block_on(station.tick(6_000)).unwrap();
        assert!(second.record.as_str().starts_with("1000,"));

        let contents = log_contents(&station);
        let lines: alloc::vec::Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], TELEMETRY_HEADER);
    }

    #[test]
    fn failed_barometer_logs_placeholders() {
        let error = SensorError::Timeout {
            sensor: "BMP280",
            operation: "wait for conversion",
        };
        let mut station = station(RecordLayout::Telemetry, Scripted::always(Err(error)));
        station.writer_mut().start(0).unwrap();

        let tick = block_on(station.tick(10)).unwrap();
        assert_eq!(tick.record.as_str(), "10,N/A,N/A,N/A,N/A,N/A");
        assert_eq!(tick.outcome, WriteOutcome::Written);
    }

    #[test]
    fn imu_layout_adds_nine_columns() {
        let mut station = station(RecordLayout::WithImu, Scripted::always(Ok(Some(BARO))));
        station.sensors_mut().imu = Scripted {
            results: alloc::vec![
                Ok(None),
                Ok(Some(ImuReading {
                    accel_mg: [0.0, 0.0, 1000.0],
                    ..ImuReading::default()
                })),
            ],
        };

        let not_ready = block_on(station.tick(0)).unwrap();
        assert!(not_ready.record.as_str().ends_with("N/A,N/A,N/A,N/A,N/A,N/A,N/A,N/A,N/A"));

        let ready = block_on(station.tick(0)).unwrap();
        assert_eq!(
            ready.record.as_str().split(',').count(),
            WITH_IMU_HEADER.split(',').count()
        );
        assert!(ready.record.as_str().contains(",0.00,0.00,1000.00,"));
    }

    #[test]
    fn storage_failure_surfaces_but_keeps_logging_state() {
        let mut station = station(RecordLayout::Telemetry, Scripted::always(Ok(Some(BARO))));
        station.writer_mut().start(0).unwrap();
        station.writer_mut().store_mut().fail_writes = true;

        assert!(matches!(
            block_on(station.tick(1)),
            Err(AppError::Storage(_))
        ));
        assert_eq!(station.writer().session().state, LoggingState::Logging);
    }

    #[test]
    fn autostart_begins_logging() {
        let writer =
            StorageWriter::new(MemoryStore::new(), "LOG.TXT", TELEMETRY_HEADER).unwrap();
        let sensors = Sensors {
            barometer: Scripted::always(Ok(None)),
            imu: Scripted::always(Ok(None)),
            gnss: Scripted::always(Ok(Some(GnssFix::from_e7(1, 2)))),
        };
        let mut station: TestStation = Station::new(
            Console::new(FakeSerial::default()),
            writer,
            sensors,
            RecordLayout::Telemetry,
        );
        station.initialize(100, true).unwrap();
        assert!(station.writer().is_logging());

        let tick = block_on(station.tick(150)).unwrap();
        assert_eq!(tick.record.as_str(), "50,0.0000001,0.0000002,N/A,N/A,N/A");
    }
}
