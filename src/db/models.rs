use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// The four sensor channels a greenhouse device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    AirTemp,
    Humidity,
    WaterTemp,
    Turbidity,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::AirTemp,
        SensorKind::Humidity,
        SensorKind::WaterTemp,
        SensorKind::Turbidity,
    ];

    /// Display unit appended to rendered values.
    pub fn unit(self) -> &'static str {
        match self {
            SensorKind::AirTemp | SensorKind::WaterTemp => "°C",
            SensorKind::Humidity => "%",
            SensorKind::Turbidity => "",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorKind::AirTemp => "air_temp",
            SensorKind::Humidity => "humidity",
            SensorKind::WaterTemp => "water_temp",
            SensorKind::Turbidity => "turbidity",
        };
        f.write_str(s)
    }
}

/// One set of sensor values. Every field is optional: a partial reading is valid.
///
/// Accepts the device firmware names (`dht_temp`, `dht_hum`) as aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorValues {
    /// Degrees Celsius
    #[serde(default, alias = "dht_temp")]
    pub air_temp: Option<f64>,
    /// Relative humidity percentage
    #[serde(default, alias = "dht_hum")]
    pub humidity: Option<f64>,
    /// Degrees Celsius
    #[serde(default)]
    pub water_temp: Option<f64>,
    #[serde(default)]
    pub turbidity: Option<f64>,
}

impl SensorValues {
    pub fn get(&self, kind: SensorKind) -> Option<f64> {
        match kind {
            SensorKind::AirTemp => self.air_temp,
            SensorKind::Humidity => self.humidity,
            SensorKind::WaterTemp => self.water_temp,
            SensorKind::Turbidity => self.turbidity,
        }
    }

    pub fn set(&mut self, kind: SensorKind, value: Option<f64>) {
        match kind {
            SensorKind::AirTemp => self.air_temp = value,
            SensorKind::Humidity => self.humidity = value,
            SensorKind::WaterTemp => self.water_temp = value,
            SensorKind::Turbidity => self.turbidity = value,
        }
    }

    /// Present values paired with their kind, in `SensorKind::ALL` order.
    pub fn present(&self) -> impl Iterator<Item = (SensorKind, f64)> + '_ {
        SensorKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|v| (kind, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// A stored row of `sensor_data`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub id: i64,
    pub site_id: String,
    pub air_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub water_temp: Option<f64>,
    pub turbidity: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    pub fn values(&self) -> SensorValues {
        SensorValues {
            air_temp: self.air_temp,
            humidity: self.humidity,
            water_temp: self.water_temp,
            turbidity: self.turbidity,
        }
    }
}

/// A reading that has not been stored yet.
///
/// `observed_at` falls back to the insert time when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewReading {
    #[serde(flatten)]
    pub values: SensorValues,
    #[serde(default, alias = "created_at")]
    pub observed_at: Option<DateTime<Utc>>,
}

/// A monitored greenhouse. Reference data; never written by this service.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Site {
    pub id: String,
    pub name: String,
}
