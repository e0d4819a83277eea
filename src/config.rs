//! Configuration loader for the `weatherflow` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Any missing or malformed setting is fatal at
//! startup; nothing here is consulted again once the loop is running.
//!
use std::{collections::HashMap, env, net::SocketAddr};

use anyhow::{anyhow, bail, Result};
use chrono::FixedOffset;

use crate::alerts::{AlertThresholds, DEFAULT_CONSECUTIVE_COUNT, DEFAULT_THRESHOLD_CELSIUS};
use crate::mock::{default_bands, TempBand};
use crate::models::DataSource;
use crate::units::TemperatureUnit;

const DEFAULT_CITIES: [&str; 6] = ["Delhi", "Mumbai", "Chennai", "Bangalore", "Kolkata", "Hyderabad"];
const DEFAULT_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Parse an optional environment variable with a default value.
macro_rules! parse_env {
    ($get:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $get($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($get:expr, $var_name:expr) => {
        $get($var_name).ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Which feed drives ingestion; also tags every stored row.
    pub data_source: DataSource,

    /// OpenWeatherMap API key. Always present when `data_source` is real.
    pub api_key: Option<String>,

    /// OpenWeatherMap current-weather endpoint.
    pub api_url: String,

    /// Cities polled on every tick, in order.
    pub cities: Vec<String>,

    pub unit: TemperatureUnit,

    /// Threshold temperature is in `unit`.
    pub alert_thresholds: AlertThresholds,

    pub update_interval_secs: u64,

    pub summary_interval_secs: u64,

    /// Length of the window backfilled with mock data at startup.
    pub mock_window_minutes: u32,

    pub mock_seed: Option<u64>,

    pub mock_bands: HashMap<String, TempBand>,

    /// Timezone that defines a "day" for summaries and the mock diurnal curve.
    pub report_offset: FixedOffset,

    pub listen_addr: SocketAddr,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
/// - `OPENWEATHERMAP_API_KEY` – only when `DATA_SOURCE=real`
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `DATA_SOURCE` – `mock` or `real` (default: mock)
/// - `WEATHER_API_URL` – current-weather endpoint
/// - `CITIES` – comma separated city names
/// - `TEMPERATURE_UNIT` – `celsius` or `fahrenheit` (default: celsius)
/// - `ALERT_THRESHOLD` – in `TEMPERATURE_UNIT` (default: 30°C converted)
/// - `CONSECUTIVE_ALERTS` – at least 1 (default: 2)
/// - `UPDATE_INTERVAL_SECS` – polling period (default: 10)
/// - `SUMMARY_INTERVAL_SECS` – summary refresh period (default: 300)
/// - `MOCK_WINDOW_MINUTES` – startup mock backfill (default: 60)
/// - `MOCK_SEED` – fixed seed for the mock generator
/// - `MOCK_TEMP_BANDS` – `City:min:max,...` in Celsius, merged over defaults
/// - `REPORT_UTC_OFFSET` – e.g. `+05:30` (default: `+00:00`)
/// - `LISTEN_ADDR` – HTTP bind address (default: `0.0.0.0:8080`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|key| env::var(key).ok())
}

/// Load configuration from an arbitrary key lookup.
pub fn load_from<F>(get: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let db_url = require_env!(get, "DATABASE_URL");
    let db_pool_max = parse_env!(get, "DB_POOL_MAX", u32, 5);
    let data_source = parse_env!(get, "DATA_SOURCE", DataSource, DataSource::Mock);

    let api_key = get("OPENWEATHERMAP_API_KEY").filter(|k| !k.trim().is_empty());
    if data_source == DataSource::Real && api_key.is_none() {
        bail!("OPENWEATHERMAP_API_KEY must be set in .env or environment when DATA_SOURCE=real");
    }
    let api_url = get("WEATHER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let cities = match get("CITIES") {
        Some(list) => parse_cities(&list)?,
        None => DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
    };

    let unit = parse_env!(get, "TEMPERATURE_UNIT", TemperatureUnit, TemperatureUnit::default());
    let threshold = parse_env!(
        get,
        "ALERT_THRESHOLD",
        f64,
        unit.convert_from_celsius(DEFAULT_THRESHOLD_CELSIUS)
    );
    if !threshold.is_finite() {
        bail!("Invalid ALERT_THRESHOLD: must be a finite number");
    }
    let consecutive_count = parse_env!(get, "CONSECUTIVE_ALERTS", u32, DEFAULT_CONSECUTIVE_COUNT);
    if consecutive_count == 0 {
        bail!("Invalid CONSECUTIVE_ALERTS: must be at least 1");
    }

    let update_interval_secs = parse_env!(get, "UPDATE_INTERVAL_SECS", u64, 10);
    let summary_interval_secs = parse_env!(get, "SUMMARY_INTERVAL_SECS", u64, 300);
    if update_interval_secs == 0 || summary_interval_secs == 0 {
        bail!("UPDATE_INTERVAL_SECS and SUMMARY_INTERVAL_SECS must be positive");
    }

    let mock_window_minutes = parse_env!(get, "MOCK_WINDOW_MINUTES", u32, 60);
    let mock_seed = get("MOCK_SEED")
        .map(|v| v.trim().parse::<u64>())
        .transpose()
        .map_err(|e| anyhow!("Invalid MOCK_SEED: {}", e))?;

    let mut mock_bands = default_bands();
    if let Some(entries) = get("MOCK_TEMP_BANDS") {
        mock_bands.extend(parse_bands(&entries)?);
    }

    let report_offset = parse_offset(get("REPORT_UTC_OFFSET").as_deref().unwrap_or("+00:00"))?;
    let listen_addr = parse_env!(
        get,
        "LISTEN_ADDR",
        SocketAddr,
        SocketAddr::from(([0, 0, 0, 0], 8080))
    );

    Ok(Config {
        db_url,
        db_pool_max,
        data_source,
        api_key,
        api_url,
        cities,
        unit,
        alert_thresholds: AlertThresholds {
            temperature: threshold,
            consecutive_count,
        },
        update_interval_secs,
        summary_interval_secs,
        mock_window_minutes,
        mock_seed,
        mock_bands,
        report_offset,
        listen_addr,
    })
}

fn parse_cities(list: &str) -> Result<Vec<String>> {
    // ---
    let cities: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();

    if cities.is_empty() {
        bail!("Invalid CITIES: at least one city is required");
    }
    Ok(cities)
}

/// Parse `City:min:max` entries separated by commas.
fn parse_bands(entries: &str) -> Result<HashMap<String, TempBand>> {
    // ---
    let mut bands = HashMap::new();

    for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let [city, min, max] = parts.as_slice() else {
            bail!("Invalid MOCK_TEMP_BANDS entry '{}': expected City:min:max", entry);
        };

        let min: f64 = min
            .parse()
            .map_err(|e| anyhow!("Invalid MOCK_TEMP_BANDS entry '{}': {}", entry, e))?;
        let max: f64 = max
            .parse()
            .map_err(|e| anyhow!("Invalid MOCK_TEMP_BANDS entry '{}': {}", entry, e))?;
        if city.is_empty() || !min.is_finite() || !max.is_finite() || min > max {
            bail!("Invalid MOCK_TEMP_BANDS entry '{}': need a city and min <= max", entry);
        }

        bands.insert(city.to_string(), TempBand::new(min, max));
    }

    Ok(bands)
}

/// Parse `+HH:MM`, `-HH:MM` or `Z`.
fn parse_offset(value: &str) -> Result<FixedOffset> {
    // ---
    let value = value.trim();
    let invalid = || anyhow!("Invalid REPORT_UTC_OFFSET '{}': expected +HH:MM", value);

    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = if let Some(rest) = value.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = value.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=59).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and the API key
    /// while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_key = self.api_key.as_ref().map(|_| "****").unwrap_or("<unset>");

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL          : {}", mask_db_url(&self.db_url));
        tracing::info!("  DB_POOL_MAX           : {}", self.db_pool_max);
        tracing::info!("  DATA_SOURCE           : {}", self.data_source);
        tracing::info!("  WEATHER_API_URL       : {}", self.api_url);
        tracing::info!("  OPENWEATHERMAP_API_KEY: {}", masked_key);
        tracing::info!("  CITIES                : {}", self.cities.join(","));
        tracing::info!("  TEMPERATURE_UNIT      : {}", self.unit);
        tracing::info!(
            "  ALERT_THRESHOLD       : {}{}",
            self.alert_thresholds.temperature,
            self.unit.symbol()
        );
        tracing::info!("  CONSECUTIVE_ALERTS    : {}", self.alert_thresholds.consecutive_count);
        tracing::info!("  UPDATE_INTERVAL_SECS  : {}", self.update_interval_secs);
        tracing::info!("  SUMMARY_INTERVAL_SECS : {}", self.summary_interval_secs);
        tracing::info!("  MOCK_WINDOW_MINUTES   : {}", self.mock_window_minutes);
        tracing::info!("  MOCK_SEED             : {:?}", self.mock_seed);
        tracing::info!("  REPORT_UTC_OFFSET     : {}", self.report_offset);
        tracing::info!("  LISTEN_ADDR           : {}", self.listen_addr);
    }
}

/// Mask the password in a database URL.
fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // scheme separator is not a password
            if !db_url[colon_pos..].starts_with("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        // ---
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        // ---
        let cfg = load_from(lookup(&[("DATABASE_URL", "postgres://u:p@localhost/db")])).unwrap();

        assert_eq!(cfg.db_pool_max, 5);
        assert_eq!(cfg.data_source, DataSource::Mock);
        assert_eq!(cfg.cities.len(), 6);
        assert_eq!(cfg.cities[0], "Delhi");
        assert_eq!(cfg.unit, TemperatureUnit::Celsius);
        assert_eq!(cfg.alert_thresholds, AlertThresholds::default());
        assert_eq!(cfg.update_interval_secs, 10);
        assert_eq!(cfg.report_offset.local_minus_utc(), 0);
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert_eq!(cfg.mock_bands.len(), 6);
        assert!(cfg.mock_seed.is_none());
    }

    #[test]
    fn test_database_url_is_required() {
        // ---
        let err = load_from(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_real_source_requires_api_key() {
        // ---
        let err = load_from(lookup(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("DATA_SOURCE", "real"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("OPENWEATHERMAP_API_KEY"));

        let cfg = load_from(lookup(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("DATA_SOURCE", "real"),
            ("OPENWEATHERMAP_API_KEY", "abc123"),
        ]))
        .unwrap();
        assert_eq!(cfg.data_source, DataSource::Real);
        assert_eq!(cfg.api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_fahrenheit_default_threshold_is_converted() {
        // ---
        let cfg = load_from(lookup(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("TEMPERATURE_UNIT", "fahrenheit"),
        ]))
        .unwrap();
        assert!((cfg.alert_thresholds.temperature - 86.0).abs() < 1e-9);

        let cfg = load_from(lookup(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("TEMPERATURE_UNIT", "fahrenheit"),
            ("ALERT_THRESHOLD", "100"),
        ]))
        .unwrap();
        assert_eq!(cfg.alert_thresholds.temperature, 100.0);
    }

    #[test]
    fn test_overrides() {
        // ---
        let cfg = load_from(lookup(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("CITIES", " Paris, ,Oslo "),
            ("CONSECUTIVE_ALERTS", "3"),
            ("MOCK_SEED", "99"),
            ("MOCK_TEMP_BANDS", "Paris:5:25, Delhi:25:47"),
            ("REPORT_UTC_OFFSET", "+05:30"),
            ("LISTEN_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();

        assert_eq!(cfg.cities, vec!["Paris".to_string(), "Oslo".to_string()]);
        assert_eq!(cfg.alert_thresholds.consecutive_count, 3);
        assert_eq!(cfg.mock_seed, Some(99));
        assert_eq!(cfg.mock_bands["Paris"], TempBand::new(5.0, 25.0));
        assert_eq!(cfg.mock_bands["Delhi"], TempBand::new(25.0, 47.0));
        assert_eq!(cfg.mock_bands["Mumbai"], TempBand::new(24.0, 35.0));
        assert_eq!(cfg.report_offset.local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(cfg.listen_addr.port(), 9000);
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        // ---
        let base = ("DATABASE_URL", "postgres://localhost/db");

        for bad in [
            ("CONSECUTIVE_ALERTS", "0"),
            ("CONSECUTIVE_ALERTS", "two"),
            ("TEMPERATURE_UNIT", "kelvin"),
            ("DATA_SOURCE", "satellite"),
            ("CITIES", " , "),
            ("MOCK_TEMP_BANDS", "Paris:30:10"),
            ("MOCK_TEMP_BANDS", "Paris:10"),
            ("REPORT_UTC_OFFSET", "IST"),
            ("REPORT_UTC_OFFSET", "+25:00"),
            ("UPDATE_INTERVAL_SECS", "0"),
        ] {
            assert!(load_from(lookup(&[base, bad])).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn test_parse_offset() {
        // ---
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_offset("-04:00").unwrap().local_minus_utc(), -14_400);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("05:30").is_err());
        assert!(parse_offset("+05:75").is_err());
    }

    #[test]
    fn test_mask_db_url() {
        // ---
        assert_eq!(
            mask_db_url("postgres://user:secret@db:5432/weather"),
            "postgres://user:****@db:5432/weather"
        );
        assert_eq!(mask_db_url("postgres://db/weather"), "postgres://db/weather");
    }
}
