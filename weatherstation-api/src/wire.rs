use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::calibration::calibrate;
use crate::models::{Channel, RawSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("record is not enclosed in braces")]
    NotBracketed,

    #[error("record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record is not a flat object")]
    NotFlat,
}

/// Parse one newline-delimited transport record into a snapshot.
///
/// The record must begin with `{`, end with `}` and decode as an object
/// whose values are scalars. Unknown keys are ignored; absent or
/// non-numeric channels are left unavailable.
pub fn parse_record(line: &str, timestamp: OffsetDateTime) -> Result<RawSnapshot, WireError> {
    let line = line.trim();

    if !line.starts_with('{') || !line.ends_with('}') {
        return Err(WireError::NotBracketed);
    }

    let record: Map<String, Value> = serde_json::from_str(line)?;

    if record.values().any(|value| value.is_object() || value.is_array()) {
        return Err(WireError::NotFlat);
    }

    let values = Channel::ALL
        .into_iter()
        .map(|channel| (channel, record.get(channel.name()).and_then(calibrate)));

    Ok(RawSnapshot::new(timestamp, values))
}
