use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::post, Json,
    Router,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{error, info};

use crate::pipeline::summarize_window;
use crate::{Config, PgStore, PipelineError};

// ---

pub fn router() -> Router<(PgStore, Config)> {
    // ---
    Router::new().route("/summaries/recompute", post(handler))
}

/// Window to recompute, RFC 3339; defaults to the trailing 24 hours. It is
/// widened to whole reporting days before summarizing.
#[derive(Debug, Deserialize)]
pub struct RecomputeQuery {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

/// `None` when the default start would fall before the representable range.
fn resolve_window(
    params: &RecomputeQuery,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let end = params.end.unwrap_or(now);
    let start = match params.start {
        Some(start) => start,
        None => end.checked_sub_signed(TimeDelta::days(1))?,
    };
    Some((start, end))
}

/// Recompute and upsert summaries for every configured city. Safe to repeat:
/// each (date, city, source) row is overwritten, never duplicated.
async fn handler(
    Query(params): Query<RecomputeQuery>,
    State((store, config)): State<(PgStore, Config)>,
) -> impl IntoResponse {
    // ---
    let Some((start, end)) = resolve_window(&params, Utc::now()) else {
        return (StatusCode::BAD_REQUEST, Json("end is out of range")).into_response();
    };
    if start > end {
        return (StatusCode::BAD_REQUEST, Json("start must not be after end")).into_response();
    }
    info!("POST /summaries/recompute start={} end={}", start, end);

    match summarize_window(&store, &config.cities, config.report_offset, start, end).await {
        Ok(summaries) => (StatusCode::OK, Json(summaries)).into_response(),
        Err(e @ PipelineError::InvalidWindow { .. }) => {
            (StatusCode::BAD_REQUEST, Json(e.to_string())).into_response()
        }
        Err(e) => {
            error!("Summary recompute failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to recompute daily summaries"),
            )
                .into_response()
        }
    }
}
