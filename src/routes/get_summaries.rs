use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use chrono::{NaiveDate, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{debug, error};

use crate::{Config, PgStore, Store};

// ---

pub fn router() -> Router<(PgStore, Config)> {
    // ---
    Router::new().route("/summaries", get(handler))
}

/// Query parameters for `GET /summaries`
#[derive(Debug, Deserialize)]
pub struct SummariesQuery {
    city: Option<String>,
    /// `YYYY-MM-DD`, defaults to 7 days before `end`
    start: Option<NaiveDate>,
    /// `YYYY-MM-DD`, defaults to today in the reporting offset
    end: Option<NaiveDate>,
}

/// Resolve the requested dates, defaulting to the week ending `today`.
/// `None` when the default start would fall before the calendar.
fn resolve_dates(params: &SummariesQuery, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let end = params.end.unwrap_or(today);
    let start = match params.start {
        Some(start) => start,
        None => end.checked_sub_signed(TimeDelta::days(7))?,
    };
    Some((start, end))
}

async fn handler(
    Query(params): Query<SummariesQuery>,
    State((store, config)): State<(PgStore, Config)>,
) -> impl IntoResponse {
    // ---
    let Some(city) = params.city.as_deref() else {
        return (StatusCode::BAD_REQUEST, Json("city is required")).into_response();
    };

    let today = Utc::now().with_timezone(&config.report_offset).date_naive();
    let Some((start, end)) = resolve_dates(&params, today) else {
        return (StatusCode::BAD_REQUEST, Json("end is out of range")).into_response();
    };
    debug!("GET /summaries city={} start={} end={}", city, start, end);

    match store.query_daily_summaries(city, start, end).await {
        Ok(summaries) => (StatusCode::OK, Json(summaries)).into_response(),
        Err(e) => {
            error!("Failed to query daily summaries for {}: {}", city, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to query daily summaries"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn query(start: Option<NaiveDate>, end: Option<NaiveDate>) -> SummariesQuery {
        SummariesQuery {
            city: Some("Delhi".into()),
            start,
            end,
        }
    }

    #[test]
    fn test_dates_default_to_last_week() {
        // ---
        let today = NaiveDate::from_ymd_opt(2025, 6, 8).unwrap();

        let (start, end) = resolve_dates(&query(None, None), today).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(end, today);
    }

    #[test]
    fn test_end_near_minimum_is_rejected() {
        // ---
        let today = NaiveDate::from_ymd_opt(2025, 6, 8).unwrap();

        assert!(resolve_dates(&query(None, Some(NaiveDate::MIN)), today).is_none());
        assert_eq!(
            resolve_dates(&query(Some(NaiveDate::MIN), Some(NaiveDate::MIN)), today),
            Some((NaiveDate::MIN, NaiveDate::MIN))
        );
    }
}
