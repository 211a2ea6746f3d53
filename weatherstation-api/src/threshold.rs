use std::collections::BTreeMap;

use crate::models::{CalibratedReading, Quantity, Verdict};

pub type Verdicts = BTreeMap<Quantity, Verdict>;

/// Static upper limits keyed by canonical quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    limits: BTreeMap<Quantity, f64>,
}

impl ThresholdTable {
    pub fn new<I>(limits: I) -> Self
    where
        I: IntoIterator<Item = (Quantity, f64)>,
    {
        Self { limits: limits.into_iter().collect() }
    }

    pub fn limit(&self, quantity: Quantity) -> Option<f64> {
        self.limits.get(&quantity).copied()
    }

    /// A value strictly above its limit is an alert; a missing value is an error.
    pub fn verdict(&self, quantity: Quantity, value: Option<f64>) -> Verdict {
        match (value, self.limit(quantity)) {
            (None, _) => Verdict::Error,
            (Some(value), Some(limit)) if value > limit => Verdict::Alert,
            (Some(_), _) => Verdict::Normal,
        }
    }

    pub fn evaluate(&self, reading: &CalibratedReading) -> Verdicts {
        reading
            .iter()
            .map(|(quantity, value)| (quantity, self.verdict(quantity, value)))
            .collect()
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::new([
            (Quantity::Temperature, 30.0),
            (Quantity::Co2, 1000.0),
            (Quantity::AirQuality, 200.0),
        ])
    }
}
