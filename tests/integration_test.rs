use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Observation {
    city: String,
    condition: String,
    temperature: f64,
    observed_at: DateTime<Utc>,
    source: String,
}

#[derive(Debug, Deserialize)]
struct DailySummary {
    date: NaiveDate,
    city: String,
    avg_temp: f64,
    max_temp: f64,
    min_temp: f64,
    dominant_condition: String,
    dominant_condition_count: u32,
    total_observations: u32,
}

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

#[tokio::test]
#[ignore = "requires a running weatherflow service at BASE_URL"]
async fn health_reports_ok() -> Result<()> {
    // ---
    let body: serde_json::Value = Client::new()
        .get(format!("{}/health", base_url()))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["status"], "ok");
    assert!(body["cities"].as_array().is_some_and(|c| !c.is_empty()));
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running weatherflow service at BASE_URL"]
async fn observations_require_city() -> Result<()> {
    // ---
    let resp = Client::new()
        .get(format!("{}/observations", base_url()))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running weatherflow service at BASE_URL"]
async fn observations_are_normalized() -> Result<()> {
    // ---
    let url = format!("{}/observations?city=Delhi&limit=50", base_url());
    let observations: Vec<Observation> = Client::new().get(&url).send().await?.json().await?;

    assert!(!observations.is_empty(), "No observations returned from {}", url);
    assert!(observations.len() <= 50);

    for o in &observations {
        assert_eq!(o.city, "Delhi");
        assert!(!o.condition.is_empty(), "condition should not be empty");
        assert!(o.temperature.is_finite());
        // Stored values are rounded to two decimals
        let scaled = o.temperature * 100.0;
        assert!((scaled - scaled.round()).abs() < 1e-6, "{} not rounded", o.temperature);
        assert!(o.source == "mock" || o.source == "real");
    }

    for pair in observations.windows(2) {
        assert!(pair[0].observed_at <= pair[1].observed_at, "observations out of order");
    }
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running weatherflow service at BASE_URL"]
async fn summaries_are_consistent() -> Result<()> {
    // ---
    let client = Client::new();
    let resp = client
        .post(format!("{}/summaries/recompute", base_url()))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let url = format!("{}/summaries?city=Delhi", base_url());
    let summaries: Vec<DailySummary> = client.get(&url).send().await?.json().await?;

    assert!(!summaries.is_empty(), "No summaries returned from {}", url);
    for s in &summaries {
        assert_eq!(s.city, "Delhi");
        assert!(s.min_temp <= s.avg_temp && s.avg_temp <= s.max_temp, "bad stats {:?}", s);
        assert!(!s.dominant_condition.is_empty());
        assert!(s.dominant_condition_count >= 1);
        assert!(s.dominant_condition_count <= s.total_observations);
    }
    for pair in summaries.windows(2) {
        assert!(pair[0].date <= pair[1].date, "summaries out of order");
    }
    Ok(())
}
