use std::io;

use weatherstation_api::wire::WireError;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("No data available from transport")]
    Idle,

    #[error("Malformed record {line:?}: {reason}")]
    MalformedRecord { line: String, reason: WireError },

    #[error("Transport read error: {0}")]
    Transport(#[from] io::Error),

    #[error("Unable to open serial port: {0}")]
    Open(#[from] serialport::Error),

    #[error("Transport closed")]
    Closed,

    #[error("Invalid source configuration: {0}")]
    Config(String),
}

impl SourceError {
    /// Faults that will not clear up by retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Open(_) | SourceError::Closed | SourceError::Config(_))
    }
}
