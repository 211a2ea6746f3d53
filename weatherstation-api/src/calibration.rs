//! Linear conversion from 10-bit ADC counts to engineering units.
//!
//! Everything here is pure: no state, no I/O, and invalid input maps to
//! `None` instead of an error.

use serde_json::Value;

use crate::models::{CalibratedReading, Quantity, RawSnapshot};

/// Full-scale ADC count.
pub const RAW_MAX: u16 = 1023;

pub fn clamp_raw(raw: i64) -> u16 {
    raw.clamp(0, RAW_MAX as i64) as u16
}

/// Interpret one transport value as a clamped raw count.
///
/// Integers and integral strings are accepted. Floats are truncated toward
/// zero. Anything else yields `None`.
pub fn calibrate(raw: &Value) -> Option<u16> {
    let count = match raw {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_u64().map(|n| n.min(i64::MAX as u64) as i64))
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))?,
        Value::String(text) => text.trim().parse::<i64>().ok()?,
        _ => return None,
    };

    Some(clamp_raw(count))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scale a clamped count onto `0..=full_scale`, rounded to 2 decimals.
pub fn scale(raw: u16, full_scale: f64) -> f64 {
    round2(raw.min(RAW_MAX) as f64 / RAW_MAX as f64 * full_scale)
}

/// Nearest raw count for an engineering value, the inverse of [`scale`].
pub fn to_raw(value: f64, full_scale: f64) -> u16 {
    if !value.is_finite() || full_scale <= 0.0 {
        return 0;
    }

    clamp_raw((value / full_scale * RAW_MAX as f64).round() as i64)
}

pub fn convert(snapshot: &RawSnapshot) -> CalibratedReading {
    let values = Quantity::ALL.into_iter().map(|quantity| {
        let value = snapshot
            .get(quantity.channel())
            .map(|raw| scale(raw, quantity.full_scale()));

        (quantity, value)
    });

    CalibratedReading::new(snapshot.timestamp, values)
}
