use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use super::Channel;

/// One set of unconverted channel counts captured at one instant.
///
/// Counts are always within `0..=RAW_MAX`. A channel without an entry was
/// absent or unreadable when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawSnapshot {
    /// Acquisition time
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Clamped raw counts per channel
    values: BTreeMap<Channel, u16>,
}

impl RawSnapshot {
    pub fn new<I>(timestamp: OffsetDateTime, values: I) -> Self
    where
        I: IntoIterator<Item = (Channel, Option<u16>)>,
    {
        let values = values
            .into_iter()
            .filter_map(|(channel, raw)| raw.map(|raw| (channel, raw.min(crate::calibration::RAW_MAX))))
            .collect();

        Self { timestamp, values }
    }

    pub fn get(&self, channel: Channel) -> Option<u16> {
        self.values.get(&channel).copied()
    }

    /// Channels that carried no usable count.
    pub fn missing(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| !self.values.contains_key(channel))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.values.len() == Channel::ALL.len()
    }
}
