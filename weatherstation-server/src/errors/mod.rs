pub mod queue;
pub mod record;
pub mod source;
pub mod telemetry;

pub use queue::QueueError;
pub use record::RecordError;
pub use source::SourceError;
pub use telemetry::TelemetryError;
