use std::io;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Record file error: {0}")]
    Io(#[from] io::Error),

    #[error("Record encoding error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}
