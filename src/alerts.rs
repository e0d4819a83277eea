//! Consecutive-breach temperature alerting.
//!
//! Each city is either `normal` (streak 0) or in a breach streak of `n`
//! readings above the threshold. When the streak reaches the configured
//! consecutive count an [`AlertEvent`] is produced and the streak resets to 0,
//! so one streak fires exactly once. Any reading at or below the threshold
//! resets the streak.
//!
//! The detector owns its state. Clone it to give each worker partition its own
//! copy; a single city must only ever be driven from one place.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{PipelineError, Result};
use crate::models::AlertEvent;

pub const DEFAULT_THRESHOLD_CELSIUS: f64 = 30.0;
pub const DEFAULT_CONSECUTIVE_COUNT: u32 = 2;

// ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Same unit as the observations fed to the detector.
    pub temperature: f64,
    pub consecutive_count: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_THRESHOLD_CELSIUS,
            consecutive_count: DEFAULT_CONSECUTIVE_COUNT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertDetector {
    thresholds: AlertThresholds,
    streaks: HashMap<String, u32>,
}

impl AlertDetector {
    // ---
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            streaks: HashMap::new(),
        }
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.thresholds
    }

    /// Current breach streak for `city` (0 when normal or never seen).
    pub fn streak(&self, city: &str) -> u32 {
        self.streaks.get(city).copied().unwrap_or(0)
    }

    /// Override a threshold by name: `temperature` or `consecutive_count`.
    pub fn set_threshold(&mut self, name: &str, value: f64) -> Result<()> {
        // ---
        let invalid = |reason| PipelineError::InvalidThreshold {
            name: name.to_string(),
            value,
            reason,
        };

        match name {
            "temperature" => {
                if !value.is_finite() {
                    return Err(invalid("must be a finite number"));
                }
                self.thresholds.temperature = value;
            }
            "consecutive_count" => {
                if !value.is_finite() || value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
                    return Err(invalid("must be a whole number >= 1"));
                }
                self.thresholds.consecutive_count = value as u32;
            }
            _ => return Err(invalid("unknown threshold name")),
        }

        tracing::debug!("Alert threshold {} set to {}", name, value);
        Ok(())
    }

    /// Feed one reading for `city`; returns an event when the streak completes.
    /// The event is stamped with the current time.
    pub fn check_alert(&mut self, city: &str, temperature: f64) -> Option<AlertEvent> {
        self.check_alert_at(city, temperature, Utc::now())
    }

    /// Like [`check_alert`](Self::check_alert), stamping the event with `at`,
    /// the time of the reading that completed the streak.
    pub fn check_alert_at(
        &mut self,
        city: &str,
        temperature: f64,
        at: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        // ---
        if temperature <= self.thresholds.temperature {
            self.streaks.insert(city.to_string(), 0);
            return None;
        }

        let streak = self.streaks.entry(city.to_string()).or_insert(0);
        *streak += 1;

        if *streak < self.thresholds.consecutive_count {
            tracing::debug!(
                "{} above threshold ({} > {}), streak {}/{}",
                city,
                temperature,
                self.thresholds.temperature,
                streak,
                self.thresholds.consecutive_count
            );
            return None;
        }

        *streak = 0;
        Some(AlertEvent {
            city: city.to_string(),
            temperature,
            threshold: self.thresholds.temperature,
            consecutive_count: self.thresholds.consecutive_count,
            timestamp: at,
        })
    }
}

/// Receives alert events. Delivery is the sink's concern, not the detector's.
pub trait AlertSink: Send + Sync {
    fn notify(&self, event: &AlertEvent);
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn notify(&self, event: &AlertEvent) {
        tracing::warn!(
            city = %event.city,
            temperature = event.temperature,
            threshold = event.threshold,
            "ALERT: temperature in {} has exceeded {} for {} consecutive updates, current {}",
            event.city,
            event.threshold,
            event.consecutive_count,
            event.temperature
        );
    }
}
