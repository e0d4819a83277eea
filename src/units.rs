//! Temperature unit conversions.
//!
//! Conversions never round; rounding happens once, when a raw reading is
//! normalized into an [`Observation`](crate::Observation).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

const KELVIN_OFFSET: f64 = 273.15;

// ---

pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - KELVIN_OFFSET
}

pub fn kelvin_to_fahrenheit(k: f64) -> f64 {
    (k - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0
}

pub fn celsius_to_kelvin(c: f64) -> f64 {
    c + KELVIN_OFFSET
}

pub fn fahrenheit_to_kelvin(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0 + KELVIN_OFFSET
}

/// Unit observations are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    // ---
    pub fn convert_from_kelvin(self, k: f64) -> f64 {
        match self {
            Self::Celsius => kelvin_to_celsius(k),
            Self::Fahrenheit => kelvin_to_fahrenheit(k),
        }
    }

    pub fn convert_to_kelvin(self, value: f64) -> f64 {
        match self {
            Self::Celsius => celsius_to_kelvin(value),
            Self::Fahrenheit => fahrenheit_to_kelvin(value),
        }
    }

    /// Convert a Celsius value into this unit.
    pub fn convert_from_celsius(self, c: f64) -> f64 {
        self.convert_from_kelvin(celsius_to_kelvin(c))
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "celsius" | "c" => Ok(Self::Celsius),
            "fahrenheit" | "f" => Ok(Self::Fahrenheit),
            other => Err(format!("unknown temperature unit '{other}'")),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius => write!(f, "celsius"),
            Self::Fahrenheit => write!(f, "fahrenheit"),
        }
    }
}
