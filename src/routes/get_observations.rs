use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{debug, error};

use crate::{Config, PgStore, Store};

const DEFAULT_LIMIT: u32 = 1000;

// ---

pub fn router() -> Router<(PgStore, Config)> {
    // ---
    Router::new().route("/observations", get(handler))
}

/// Query parameters for `GET /observations`
#[derive(Debug, Deserialize)]
pub struct ObservationsQuery {
    city: Option<String>,
    /// RFC 3339, defaults to 24 hours before `end`
    start: Option<DateTime<Utc>>,
    /// RFC 3339, defaults to now
    end: Option<DateTime<Utc>>,
    limit: Option<u32>,
}

/// Resolve the requested window, filling in the trailing-day default.
/// `None` when the default start would fall before the representable range.
fn resolve_window(
    params: &ObservationsQuery,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let end = params.end.unwrap_or(now);
    let start = match params.start {
        Some(start) => start,
        None => end.checked_sub_signed(TimeDelta::days(1))?,
    };
    Some((start, end))
}

async fn handler(
    Query(params): Query<ObservationsQuery>,
    State((store, _config)): State<(PgStore, Config)>,
) -> impl IntoResponse {
    // ---
    let Some(city) = params.city.as_deref() else {
        return (StatusCode::BAD_REQUEST, Json("city is required")).into_response();
    };
    let Some((start, end)) = resolve_window(&params, Utc::now()) else {
        return (StatusCode::BAD_REQUEST, Json("end is out of range")).into_response();
    };
    debug!("GET /observations city={} start={} end={}", city, start, end);

    match store.query_observations(city, start, end).await {
        Ok(observations) => {
            let limit = params.limit.unwrap_or(DEFAULT_LIMIT) as usize;
            let observations: Vec<_> = observations.into_iter().take(limit).collect();
            (StatusCode::OK, Json(observations)).into_response()
        }
        Err(e) => {
            error!("Failed to query observations for {}: {}", city, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to query observations"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_defaults_to_trailing_day() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        let params = ObservationsQuery {
            city: Some("Delhi".into()),
            start: None,
            end: None,
            limit: None,
        };

        let (start, end) = resolve_window(&params, now).unwrap();
        assert_eq!(end, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_query_string_parsing() {
        // ---
        let params: ObservationsQuery = serde_json::from_value(serde_json::json!({
            "city": "Delhi",
            "start": "2025-06-01T00:00:00Z",
            "limit": 10
        }))
        .unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap();

        let (start, end) = resolve_window(&params, now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, now);
        assert_eq!(params.limit, Some(10));
    }

    #[test]
    fn test_end_near_minimum_is_rejected() {
        // ---
        let params = ObservationsQuery {
            city: Some("Delhi".into()),
            start: None,
            end: Some(DateTime::<Utc>::MIN_UTC),
            limit: None,
        };
        assert!(resolve_window(&params, Utc::now()).is_none());

        // an explicit start needs no arithmetic
        let params = ObservationsQuery {
            start: Some(DateTime::<Utc>::MIN_UTC),
            ..params
        };
        assert!(resolve_window(&params, Utc::now()).is_some());
    }
}
