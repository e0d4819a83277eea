//! Error taxonomy for the ingestion core.
//!
//! Only conditions that must cross the core boundary live here. A raw reading
//! that fails validation is dropped (`None`) and an aggregation over no usable
//! data yields an empty `Vec`; neither is an error.

use chrono::{DateTime, Utc};

// ---

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The persistence collaborator reported a failure.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// `AlertDetector::set_threshold` was given an unknown name or bad value.
    #[error("Invalid threshold {name}={value}: {reason}")]
    InvalidThreshold {
        name: String,
        value: f64,
        reason: &'static str,
    },

    /// A summary window whose whole-day bounds fall outside the calendar.
    #[error("Invalid summary window {start} .. {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
