use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use weatherstation_api::{CalibratedReading, Quantity};

use crate::errors::RecordError;

pub trait RecordSink: Send {
    /// Create the store with its header if it does not exist yet.
    fn ensure_initialized(&self) -> Result<(), RecordError>;

    /// Append one row for the reading.
    fn append(&self, reading: &CalibratedReading) -> Result<(), RecordError>;
}

pub fn header() -> Vec<&'static str> {
    std::iter::once("timestamp")
        .chain(Quantity::ALL.iter().map(Quantity::name))
        .collect()
}

/// Cell text for a value, always with a decimal point (`500.0`, not `500`).
pub fn format_value(value: f64) -> String {
    format!("{value:?}")
}

/// Append-only CSV log, one row per processing cycle.
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    path: PathBuf,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn row(reading: &CalibratedReading) -> Result<Vec<String>, RecordError> {
        let timestamp = reading
            .timestamp
            .to_offset(time::UtcOffset::UTC)
            .format(&Rfc3339)?;

        // an empty cell keeps "unavailable" apart from a real zero
        let values = reading.iter().map(|(_, value)| value.map(format_value).unwrap_or_default());

        Ok(std::iter::once(timestamp).chain(values).collect())
    }
}

impl RecordSink for CsvRecordStore {
    fn ensure_initialized(&self) -> Result<(), RecordError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %self.path.display(), "record file already exists");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header())?;
        writer.flush()?;

        tracing::info!(path = %self.path.display(), "created record file");

        Ok(())
    }

    fn append(&self, reading: &CalibratedReading) -> Result<(), RecordError> {
        if !self.path.exists() {
            self.ensure_initialized()?;
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(Self::row(reading)?)?;
        writer.flush()?;

        Ok(())
    }
}
