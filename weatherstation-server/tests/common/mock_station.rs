use std::fs;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use weatherstation_api::CalibratedReading;
use weatherstation_server::configs::{Gateway, Logger, Pipeline, Record, Settings, Source};
use weatherstation_server::errors::TelemetryError;
use weatherstation_server::services::{CsvRecordStore, RecordSink, Telemetry};

/// Telemetry double that keeps every message instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct RecordingTelemetry {
    pub readings: Arc<Mutex<Vec<CalibratedReading>>>,
    pub heartbeats: Arc<Mutex<usize>>,
}

impl Telemetry for RecordingTelemetry {
    fn publish_reading(&self, reading: &CalibratedReading) -> Result<bool, TelemetryError> {
        self.readings.lock().unwrap().push(reading.clone());
        Ok(true)
    }

    fn publish_heartbeat(&self) -> Result<bool, TelemetryError> {
        *self.heartbeats.lock().unwrap() += 1;
        Ok(true)
    }
}

pub struct MockStation {
    pub dir: TempDir,
    pub store: CsvRecordStore,
    pub telemetry: RecordingTelemetry,
}

impl MockStation {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("sensor_data.csv"));
        store.ensure_initialized().unwrap();

        Self { dir, store, telemetry: RecordingTelemetry::default() }
    }

    pub fn rows(&self) -> Vec<String> {
        fs::read_to_string(self.store.path())
            .unwrap()
            .lines()
            .skip(1)
            .map(str::to_string)
            .collect()
    }

    pub fn settings(&self, source: Source) -> Settings {
        Settings {
            logger: Logger { level: "debug".to_string(), file: None, file_level: None },
            gateway: Gateway {
                host: "127.0.0.1".to_string(),
                port: 1,
                client_id: "station-test".to_string(),
                keep_alive_secs: 30,
                reconnect_delay_ms: 50,
                topic: "weather/workstation".to_string(),
                status_topic: Some("weather/status/test".to_string()),
            },
            record: Record { path: self.dir.path().join("station.csv").to_string_lossy().to_string() },
            pipeline: Pipeline { process_interval_ms: 20, queue_capacity: 16, stall_warning_ms: 1000 },
            source,
        }
    }
}
