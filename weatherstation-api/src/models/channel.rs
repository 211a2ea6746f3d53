use core::fmt;

use serde::{Deserialize, Serialize};

/// Raw analog channel as reported by the sensor array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Electrochemical oxygen cell
    Oxygen,
    /// UV photodiode
    Uv,
    /// Barometric pressure
    Pressure,
    /// Pyranometer, also wired to the GSR input
    Solar,
    /// Combined temperature and humidity probe
    TempHumidity,
    /// NDIR carbon dioxide
    Co2,
    /// Mixed gas air quality
    AirQuality,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::Oxygen,
        Channel::Uv,
        Channel::Pressure,
        Channel::Solar,
        Channel::TempHumidity,
        Channel::Co2,
        Channel::AirQuality,
    ];

    /// Key used by the transport record.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Oxygen => "oxygen",
            Channel::Uv => "uv",
            Channel::Pressure => "pressure",
            Channel::Solar => "solar",
            Channel::TempHumidity => "temp_humidity",
            Channel::Co2 => "co2",
            Channel::AirQuality => "air_quality",
        }
    }

    /// Quantities derived from this channel.
    pub fn quantities(&self) -> impl Iterator<Item = Quantity> + '_ {
        Quantity::ALL.into_iter().filter(move |q| q.channel() == *self)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Engineering quantity produced by calibration.
///
/// Declaration order is the persisted column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Temperature,
    Humidity,
    #[serde(rename = "CO2")]
    Co2,
    Oxygen,
    #[serde(rename = "UV Index")]
    UvIndex,
    #[serde(rename = "Solar Radiation")]
    SolarRadiation,
    #[serde(rename = "Air Quality")]
    AirQuality,
    #[serde(rename = "GSR")]
    Gsr,
    #[serde(rename = "Atmospheric Pressure")]
    AtmosphericPressure,
}

impl Quantity {
    pub const ALL: [Quantity; 9] = [
        Quantity::Temperature,
        Quantity::Humidity,
        Quantity::Co2,
        Quantity::Oxygen,
        Quantity::UvIndex,
        Quantity::SolarRadiation,
        Quantity::AirQuality,
        Quantity::Gsr,
        Quantity::AtmosphericPressure,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Quantity::Temperature => "Temperature",
            Quantity::Humidity => "Humidity",
            Quantity::Co2 => "CO2",
            Quantity::Oxygen => "Oxygen",
            Quantity::UvIndex => "UV Index",
            Quantity::SolarRadiation => "Solar Radiation",
            Quantity::AirQuality => "Air Quality",
            Quantity::Gsr => "GSR",
            Quantity::AtmosphericPressure => "Atmospheric Pressure",
        }
    }

    /// Raw channel this quantity is scaled from.
    ///
    /// Solar Radiation and GSR share the pyranometer input on the board.
    pub fn channel(&self) -> Channel {
        match self {
            Quantity::Temperature | Quantity::Humidity => Channel::TempHumidity,
            Quantity::Co2 => Channel::Co2,
            Quantity::Oxygen => Channel::Oxygen,
            Quantity::UvIndex => Channel::Uv,
            Quantity::SolarRadiation | Quantity::Gsr => Channel::Solar,
            Quantity::AirQuality => Channel::AirQuality,
            Quantity::AtmosphericPressure => Channel::Pressure,
        }
    }

    /// Engineering value at full raw scale.
    pub fn full_scale(&self) -> f64 {
        match self {
            Quantity::Temperature => 50.0,
            Quantity::Humidity => 100.0,
            Quantity::Co2 => 2000.0,
            Quantity::Oxygen => 21.0,
            Quantity::UvIndex => 11.0,
            Quantity::SolarRadiation => 1200.0,
            Quantity::AirQuality => 500.0,
            Quantity::Gsr => 100.0,
            Quantity::AtmosphericPressure => 1100.0,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Quantity::Temperature => "°C",
            Quantity::Humidity => "%",
            Quantity::Co2 => "ppm",
            Quantity::Oxygen => "%",
            Quantity::UvIndex => "index",
            Quantity::SolarRadiation => "W/m²",
            Quantity::AirQuality => "AQI",
            Quantity::Gsr => "",
            Quantity::AtmosphericPressure => "hPa",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
