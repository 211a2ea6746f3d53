use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use super::Quantity;

/// Engineering-unit values derived from exactly one [`RawSnapshot`](super::RawSnapshot).
///
/// Every quantity has an entry. `None` marks a value that could not be
/// derived, which is never the same as a reading of zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibratedReading {
    /// Acquisition time of the originating snapshot
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(flatten)]
    values: BTreeMap<Quantity, Option<f64>>,
}

impl CalibratedReading {
    pub fn new<I>(timestamp: OffsetDateTime, values: I) -> Self
    where
        I: IntoIterator<Item = (Quantity, Option<f64>)>,
    {
        let mut all: BTreeMap<Quantity, Option<f64>> =
            Quantity::ALL.into_iter().map(|q| (q, None)).collect();
        all.extend(values);

        Self { timestamp, values: all }
    }

    pub fn get(&self, quantity: Quantity) -> Option<f64> {
        self.values.get(&quantity).copied().flatten()
    }

    pub fn is_available(&self, quantity: Quantity) -> bool {
        self.get(quantity).is_some()
    }

    /// Values in persisted column order.
    pub fn iter(&self) -> impl Iterator<Item = (Quantity, Option<f64>)> + '_ {
        self.values.iter().map(|(q, v)| (*q, *v))
    }
}
