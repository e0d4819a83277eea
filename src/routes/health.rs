// src/routes/health.rs
//! Liveness endpoint.
//!
//! `GET /health` answers without touching the database so orchestrators can
//! tell a wedged process from a slow store. It echoes which feed the service
//! ingests from and which cities it tracks, handy when several instances run
//! side by side against mock and real data.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{Config, DataSource, PgStore, TemperatureUnit};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    data_source: DataSource,
    unit: TemperatureUnit,
    cities: Vec<String>,
}

async fn health(State((_, config)): State<(PgStore, Config)>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        data_source: config.data_source,
        unit: config.unit,
        cities: config.cities,
    })
}

pub fn router() -> Router<(PgStore, Config)> {
    Router::new().route("/health", get(health))
}
