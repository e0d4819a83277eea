//! Database schema management for `weatherflow`.
//!
//! Ensures required tables and indexes exist before ingestion starts.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the database schema if it does not exist (idempotent).
///
/// Creates `weather_observations` for normalized readings and
/// `daily_summaries` for per-day aggregates. The summary primary key is the
/// upsert key `(summary_date, city, source)`.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_observations (
            id                UUID PRIMARY KEY,
            city              TEXT             NOT NULL,
            weather_condition TEXT             NOT NULL,
            description       TEXT             NOT NULL DEFAULT '',
            temperature       DOUBLE PRECISION NOT NULL,
            feels_like        DOUBLE PRECISION,
            observed_at       TIMESTAMPTZ      NOT NULL,
            source            TEXT             NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_summaries (
            summary_date             DATE             NOT NULL,
            city                     TEXT             NOT NULL,
            source                   TEXT             NOT NULL,
            avg_temp                 DOUBLE PRECISION NOT NULL,
            max_temp                 DOUBLE PRECISION NOT NULL,
            min_temp                 DOUBLE PRECISION NOT NULL,
            dominant_condition       TEXT             NOT NULL,
            dominant_condition_count INTEGER          NOT NULL,
            total_observations       INTEGER          NOT NULL,
            PRIMARY KEY (summary_date, city, source)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Window queries are always per city and source
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_weather_observations_city_time
            ON weather_observations (city, source, observed_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
