//! Weather observation ingestion, alerting and daily aggregation.
//!
//! Data flows from a feed (live or mock) through normalization into storage
//! and the alert detector, and from storage into per-day summaries.

pub mod aggregate;
pub mod alerts;
pub mod config;
pub mod error;
pub mod feed;
pub mod mock;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod schema;
pub mod store;
pub mod units;

// Re-export public API
pub use aggregate::daily_summaries;
pub use alerts::{AlertDetector, AlertSink, AlertThresholds, LogSink};
pub use config::Config;
pub use error::{PipelineError, Result};
pub use feed::{Feed, FeedSource, MockFeed, OpenWeatherClient};
pub use mock::{MockGenerator, TempBand};
pub use models::{AlertEvent, DailySummary, DataSource, Observation, RawReading};
pub use pipeline::{summarize_window, IngestReport, Pipeline};
pub use store::{PgStore, Store};
pub use units::TemperatureUnit;
