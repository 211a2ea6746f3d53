pub mod processor;
pub mod queue;
pub mod record_service;
pub mod telemetry_service;

pub use processor::Processor;
pub use record_service::{CsvRecordStore, RecordSink};
pub use telemetry_service::{ConnectionDriver, ConnectionState, Telemetry, TelemetryService};
