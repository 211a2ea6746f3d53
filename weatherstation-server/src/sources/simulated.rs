use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution, Normal};
use time::OffsetDateTime;
use weatherstation_api::calibration::to_raw;
use weatherstation_api::{Channel, Quantity, RawSnapshot};

use crate::errors::SourceError;
use crate::sources::Source;

/// Realistic physical band for one channel, expressed through the quantity
/// whose scale maps it back to raw counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelProfile {
    pub channel: Channel,
    pub via: Quantity,
    pub low: f64,
    pub high: f64,
}

impl ChannelProfile {
    const fn new(channel: Channel, via: Quantity, low: f64, high: f64) -> Self {
        Self { channel, via, low, high }
    }

    pub const DEFAULTS: [ChannelProfile; 7] = [
        ChannelProfile::new(Channel::TempHumidity, Quantity::Temperature, 15.0, 35.0),
        ChannelProfile::new(Channel::Co2, Quantity::Co2, 350.0, 2000.0),
        ChannelProfile::new(Channel::Oxygen, Quantity::Oxygen, 19.0, 21.0),
        ChannelProfile::new(Channel::Uv, Quantity::UvIndex, 0.0, 11.0),
        ChannelProfile::new(Channel::Solar, Quantity::SolarRadiation, 0.0, 1000.0),
        ChannelProfile::new(Channel::AirQuality, Quantity::AirQuality, 0.0, 500.0),
        ChannelProfile::new(Channel::Pressure, Quantity::AtmosphericPressure, 950.0, 1050.0),
    ];

    /// Normal draw centred on the band with ±3σ spanning it, clamped.
    fn sample<R: Rng>(&self, rng: &mut R) -> u16 {
        let mean = (self.low + self.high) / 2.0;
        let std_dev = (self.high - self.low) / 6.0;

        let value = match Normal::new(mean, std_dev) {
            Ok(normal) => normal.sample(rng).clamp(self.low, self.high),
            Err(_) => mean,
        };

        to_raw(value, self.via.full_scale())
    }
}

/// Stand-in for the station when no hardware is attached.
pub struct SimulatedSource<R = StdRng> {
    rng: R,
    profiles: Vec<ChannelProfile>,
    faults: Bernoulli,
    max_retries: u32,
    retry_pause: Duration,
    read_interval: Duration,
}

impl SimulatedSource<StdRng> {
    pub fn from_entropy(
        read_interval: Duration,
        max_retries: u32,
        retry_pause: Duration,
        failure_rate: f64,
    ) -> Result<Self, SourceError> {
        Self::new(StdRng::from_os_rng(), read_interval, max_retries, retry_pause, failure_rate)
    }
}

impl<R> SimulatedSource<R>
where
    R: Rng + Send,
{
    pub fn new(
        rng: R,
        read_interval: Duration,
        max_retries: u32,
        retry_pause: Duration,
        failure_rate: f64,
    ) -> Result<Self, SourceError> {
        let faults = Bernoulli::new(failure_rate)
            .map_err(|_| SourceError::Config(format!("failure rate {failure_rate} is not a probability")))?;

        Ok(Self {
            rng,
            profiles: ChannelProfile::DEFAULTS.to_vec(),
            faults,
            max_retries: max_retries.max(1),
            retry_pause,
            read_interval,
        })
    }

    pub fn with_profiles(mut self, profiles: Vec<ChannelProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    async fn read_channel(&mut self, profile: ChannelProfile) -> Option<u16> {
        for attempt in 1..=self.max_retries {
            if !self.faults.sample(&mut self.rng) {
                return Some(profile.sample(&mut self.rng));
            }

            tracing::debug!(channel = %profile.channel, attempt, "simulated sensor fault");

            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_pause).await;
            }
        }

        tracing::warn!(channel = %profile.channel, attempts = self.max_retries, "sensor read failed after retries");

        None
    }
}

#[async_trait]
impl<R> Source for SimulatedSource<R>
where
    R: Rng + Send,
{
    async fn produce_snapshot(&mut self) -> Result<RawSnapshot, SourceError> {
        let timestamp = OffsetDateTime::now_utc();

        let mut values = Vec::with_capacity(self.profiles.len());
        for profile in self.profiles.clone() {
            values.push((profile.channel, self.read_channel(profile).await));
        }

        Ok(RawSnapshot::new(timestamp, values))
    }

    fn cadence(&self) -> Duration {
        self.read_interval
    }
}
