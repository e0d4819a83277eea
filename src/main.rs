//! Application entry point for the `weatherflow` service.
//!
//! Startup sequence:
//! - Initialize structured logging/tracing
//! - Load configuration from environment variables or `.env`
//! - Connect to PostgreSQL and create the schema if it does not exist
//! - Build the weather feed (mock generator or OpenWeatherMap client)
//! - Backfill a window of mock history when running on mock data
//! - Spawn the polling pipeline and serve the HTTP API
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `WEATHERFLOW_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `WEATHERFLOW_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See [`weatherflow::config::load_from_env`] for the full list.
use std::{env, time::Duration};

use anyhow::{anyhow, Result};
use axum::Router;
use chrono::{TimeDelta, Utc};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use rand::{rngs::StdRng, SeedableRng};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use weatherflow::{
    config, routes, schema, DataSource, Feed, LogSink, MockFeed, MockGenerator, OpenWeatherClient,
    PgStore, Pipeline,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let store = PgStore::new(pool, cfg.data_source);
    let feed = build_feed(&cfg)?;
    let mut pipeline = Pipeline::new(store.clone(), feed, LogSink, &cfg);

    if cfg.data_source == DataSource::Mock {
        let end = Utc::now();
        let start = end - TimeDelta::minutes(cfg.mock_window_minutes as i64);
        let report = pipeline.backfill(start, end).await?;
        tracing::info!(
            "Backfilled {} mock observations ({} alerts)",
            report.observations.len(),
            report.alerts.len()
        );
        pipeline.summarize(start, end).await?;
    }

    tokio::spawn(pipeline.run(
        Duration::from_secs(cfg.update_interval_secs),
        Duration::from_secs(cfg.summary_interval_secs),
    ));

    let addr = cfg.listen_addr;
    let app: Router = routes::router(store, cfg);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

fn build_feed(cfg: &config::Config) -> Result<Feed> {
    // ---
    match cfg.data_source {
        DataSource::Mock => {
            let rng = match cfg.mock_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let generator = MockGenerator::new(cfg.mock_bands.clone(), cfg.report_offset);
            Ok(Feed::Mock(MockFeed::new(generator, rng)))
        }
        DataSource::Real => {
            let api_key = cfg
                .api_key
                .as_deref()
                .ok_or_else(|| anyhow!("OPENWEATHERMAP_API_KEY is required for real data"))?;
            let client = OpenWeatherClient::new(&cfg.api_url, api_key)?;
            Ok(Feed::Live(client))
        }
    }
}

/// Install the global tracing subscriber.
///
/// - Colors follow `FORCE_COLOR` (`1|true|yes` on, `0|false|no` off),
///   otherwise TTY detection on stdout
/// - `WEATHERFLOW_SPAN_EVENTS`: `full` for ENTER/EXIT/CLOSE, `enter_exit`
///   for ENTER/EXIT, anything else for CLOSE only
/// - `RUST_LOG` wins when set, else `WEATHERFLOW_LOG_LEVEL` (default `debug`)
fn init_tracing() {
    // ---
    let span_events = match env::var("WEATHERFLOW_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("WEATHERFLOW_LOG_LEVEL").ok().as_deref() {
            Some(level @ ("trace" | "debug" | "info" | "warn" | "error")) => level.to_string(),
            _ => "debug".to_string(),
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
