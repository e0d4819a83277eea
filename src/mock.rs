//! Synthetic weather source.
//!
//! Temperatures follow a diurnal sine between a per-city Celsius band, with
//! uniform jitter, and conditions are drawn from a fixed palette weighted by
//! how hot it is. Readings are emitted in Kelvin like the live feed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use rand::distr::{weighted::WeightedIndex, Distribution};
use rand::Rng;

use crate::models::{RawCondition, RawMain, RawReading};
use crate::units::celsius_to_kelvin;

/// Minutes between generated ticks.
pub const TICK_MINUTES: i64 = 10;

const JITTER: f64 = 2.0;

const PALETTE: [(&str, &str); 6] = [
    ("Clear", "clear sky"),
    ("Clouds", "scattered clouds"),
    ("Rain", "light rain"),
    ("Thunderstorm", "thunderstorm"),
    ("Snow", "light snow"),
    ("Mist", "mist"),
];

const HOT_WEIGHTS: [f64; 6] = [0.6, 0.3, 0.05, 0.05, 0.0, 0.0];
const COLD_WEIGHTS: [f64; 6] = [0.2, 0.3, 0.2, 0.1, 0.1, 0.1];
const MILD_WEIGHTS: [f64; 6] = [0.3, 0.3, 0.2, 0.1, 0.05, 0.05];

// ---

/// Climatological (min, max) temperature band in Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempBand {
    pub min: f64,
    pub max: f64,
}

impl TempBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Band used for any city without its own entry.
pub const FALLBACK_BAND: TempBand = TempBand::new(15.0, 35.0);

pub fn default_bands() -> HashMap<String, TempBand> {
    [
        ("Delhi", TempBand::new(20.0, 45.0)),
        ("Mumbai", TempBand::new(24.0, 35.0)),
        ("Chennai", TempBand::new(24.0, 38.0)),
        ("Bangalore", TempBand::new(18.0, 32.0)),
        ("Kolkata", TempBand::new(22.0, 38.0)),
        ("Hyderabad", TempBand::new(20.0, 40.0)),
    ]
    .into_iter()
    .map(|(city, band)| (city.to_string(), band))
    .collect()
}

#[derive(Debug, Clone)]
pub struct MockGenerator {
    bands: HashMap<String, TempBand>,
    offset: FixedOffset,
}

impl MockGenerator {
    // ---
    /// `offset` is the timezone whose wall-clock hour drives the diurnal curve.
    pub fn new(bands: HashMap<String, TempBand>, offset: FixedOffset) -> Self {
        Self { bands, offset }
    }

    pub fn band(&self, city: &str) -> TempBand {
        self.bands.get(city).copied().unwrap_or(FALLBACK_BAND)
    }

    /// One synthetic reading for `city` at `at`.
    pub fn reading_at<R: Rng>(&self, city: &str, at: DateTime<Utc>, rng: &mut R) -> RawReading {
        // ---
        let band = self.band(city);
        let hour = at.with_timezone(&self.offset).hour() as f64;

        let temp = diurnal_base(band, hour) + rng.random_range(-JITTER..=JITTER);
        let feels_like = temp + rng.random_range(-JITTER..=JITTER);

        let weights = condition_weights(temp);
        let idx = WeightedIndex::new(weights)
            .map(|dist| dist.sample(rng))
            .unwrap_or(0);
        let (main, description) = PALETTE[idx];

        RawReading {
            name: Some(city.to_string()),
            main: Some(RawMain {
                temp: Some(celsius_to_kelvin(temp)),
                feels_like: Some(celsius_to_kelvin(feels_like)),
            }),
            weather: Some(vec![RawCondition {
                main: Some(main.to_string()),
                description: Some(description.to_string()),
            }]),
            dt: Some(at.timestamp()),
        }
    }

    /// Readings for every city at every 10-minute tick from `start` through
    /// `end`, both ends included when the stepping lands on them.
    pub fn generate<R: Rng>(
        &self,
        cities: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<RawReading> {
        // ---
        let step = Duration::minutes(TICK_MINUTES);
        let mut readings = Vec::new();
        let mut current = start;

        while current <= end {
            for city in cities {
                readings.push(self.reading_at(city, current, rng));
            }
            current += step;
        }

        tracing::debug!(
            "Generated {} mock readings for {} cities between {} and {}",
            readings.len(),
            cities.len(),
            start,
            end
        );
        readings
    }
}

/// Sine over the day: band minimum at midnight, maximum at noon.
fn diurnal_base(band: TempBand, hour: f64) -> f64 {
    let daily_factor = ((hour * std::f64::consts::PI / 12.0 - std::f64::consts::FRAC_PI_2).sin() + 1.0) / 2.0;
    band.min + daily_factor * (band.max - band.min)
}

fn condition_weights(temp_c: f64) -> [f64; 6] {
    if temp_c > 35.0 {
        HOT_WEIGHTS
    } else if temp_c < 15.0 {
        COLD_WEIGHTS
    } else {
        MILD_WEIGHTS
    }
}
