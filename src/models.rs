//! Data models for the weather pipeline.
//!
//! `RawReading` mirrors the OpenWeatherMap current-weather payload. Its
//! temperatures are always Kelvin, whether it came from the live feed or the
//! mock generator, so there is a single conversion path into `Observation`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::units::TemperatureUnit;

// ---

/// Raw weather payload from a feed. Every field is optional so that partial
/// payloads deserialize and are then rejected by validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReading {
    // ---
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<RawMain>,
    #[serde(default)]
    pub weather: Option<Vec<RawCondition>>,
    /// Unix timestamp, seconds.
    #[serde(default)]
    pub dt: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMain {
    /// Kelvin.
    #[serde(default)]
    pub temp: Option<f64>,
    /// Kelvin.
    #[serde(default)]
    pub feels_like: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCondition {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Which feed produced a record. Part of the observation and summary identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Mock,
    Real,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Real => "real",
        }
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "real" => Ok(Self::Real),
            other => Err(format!("unknown data source '{other}' (expected mock or real)")),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, normalized weather observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    // ---
    pub city: String,
    pub condition: String,
    pub description: String,
    /// In the configured unit, rounded to 2 decimals.
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub observed_at: DateTime<Utc>,
    pub source: DataSource,
}

/// One aggregate per (date, city, source).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    // ---
    pub date: NaiveDate,
    pub city: String,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub dominant_condition: String,
    pub dominant_condition_count: u32,
    pub total_observations: u32,
    pub source: DataSource,
}

/// Emitted when a city breaches the threshold for the required number of
/// consecutive readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub city: String,
    pub temperature: f64,
    pub threshold: f64,
    pub consecutive_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalization of raw feed payloads
impl RawReading {
    // ---
    /// Validate and convert into an [`Observation`].
    ///
    /// Returns `None` when the city name, the condition list (or its primary
    /// condition) or the temperature is missing. A missing timestamp is
    /// tolerated and replaced with the current time.
    pub fn to_observation(&self, unit: TemperatureUnit, source: DataSource) -> Option<Observation> {
        // ---
        let city = self.name.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        let primary = self.weather.as_ref()?.first()?;
        let condition = primary
            .main
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())?;

        let main = self.main.as_ref()?;
        let temp_k = main.temp.filter(|t| t.is_finite())?;
        let feels_like_k = main.feels_like.filter(|t| t.is_finite());

        let observed_at = match self.dt.and_then(|dt| DateTime::from_timestamp(dt, 0)) {
            Some(ts) => ts,
            None => {
                tracing::warn!(
                    "Reading for {} has no usable timestamp ({:?}), using current time",
                    city,
                    self.dt
                );
                Utc::now()
            }
        };

        Some(Observation {
            city: city.to_string(),
            condition: condition.to_string(),
            description: primary.description.clone().unwrap_or_default(),
            temperature: round2(unit.convert_from_kelvin(temp_k)),
            feels_like: feels_like_k.map(|k| round2(unit.convert_from_kelvin(k))),
            observed_at,
            source,
        })
    }
}
