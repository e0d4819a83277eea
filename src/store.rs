//! Persistence of observations and daily summaries.
//!
//! [`PgStore`] is bound to one [`DataSource`]: every row it writes carries the
//! source tag and every query filters on it, so mock and real data never mix.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{DailySummary, DataSource, Observation};

// ---

pub trait Store: Send + Sync {
    fn source(&self) -> DataSource;

    fn store_observation(&self, obs: &Observation) -> impl Future<Output = Result<()>> + Send;

    /// Observations for `city` with `start <= observed_at <= end`, oldest first.
    fn query_observations(
        &self,
        city: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Observation>>> + Send;

    /// Insert or overwrite the summary keyed by (date, city, source), using the
    /// summary's own source tag.
    fn upsert_daily_summary(&self, summary: &DailySummary) -> impl Future<Output = Result<()>> + Send;

    /// Summaries for `city` with `start <= date <= end`, by date.
    fn query_daily_summaries(
        &self,
        city: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DailySummary>>> + Send;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    source: DataSource,
}

impl PgStore {
    pub fn new(pool: PgPool, source: DataSource) -> Self {
        Self { pool, source }
    }
}

#[derive(sqlx::FromRow)]
struct ObservationRow {
    city: String,
    weather_condition: String,
    description: String,
    temperature: f64,
    feels_like: Option<f64>,
    observed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    summary_date: NaiveDate,
    city: String,
    avg_temp: f64,
    max_temp: f64,
    min_temp: f64,
    dominant_condition: String,
    dominant_condition_count: i32,
    total_observations: i32,
}

impl Store for PgStore {
    fn source(&self) -> DataSource {
        self.source
    }

    async fn store_observation(&self, obs: &Observation) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO weather_observations (
                id, city, weather_condition, description,
                temperature, feels_like, observed_at, source
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&obs.city)
        .bind(&obs.condition)
        .bind(&obs.description)
        .bind(obs.temperature)
        .bind(obs.feels_like)
        .bind(obs.observed_at)
        .bind(self.source.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_observations(
        &self,
        city: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        // ---
        let rows: Vec<ObservationRow> = sqlx::query_as(
            r#"
            SELECT city, weather_condition, description, temperature, feels_like, observed_at
            FROM weather_observations
            WHERE city = $1
              AND source = $2
              AND observed_at BETWEEN $3 AND $4
            ORDER BY observed_at
            "#,
        )
        .bind(city)
        .bind(self.source.as_str())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let source = self.source;
        Ok(rows
            .into_iter()
            .map(|r| Observation {
                city: r.city,
                condition: r.weather_condition,
                description: r.description,
                temperature: r.temperature,
                feels_like: r.feels_like,
                observed_at: r.observed_at,
                source,
            })
            .collect())
    }

    async fn upsert_daily_summary(&self, summary: &DailySummary) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO daily_summaries (
                summary_date, city, source,
                avg_temp, max_temp, min_temp,
                dominant_condition, dominant_condition_count, total_observations
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (summary_date, city, source) DO UPDATE SET
                avg_temp = EXCLUDED.avg_temp,
                max_temp = EXCLUDED.max_temp,
                min_temp = EXCLUDED.min_temp,
                dominant_condition = EXCLUDED.dominant_condition,
                dominant_condition_count = EXCLUDED.dominant_condition_count,
                total_observations = EXCLUDED.total_observations
            "#,
        )
        .bind(summary.date)
        .bind(&summary.city)
        .bind(summary.source.as_str())
        .bind(summary.avg_temp)
        .bind(summary.max_temp)
        .bind(summary.min_temp)
        .bind(&summary.dominant_condition)
        .bind(summary.dominant_condition_count as i32)
        .bind(summary.total_observations as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_daily_summaries(
        &self,
        city: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        // ---
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT summary_date, city, avg_temp, max_temp, min_temp,
                   dominant_condition, dominant_condition_count, total_observations
            FROM daily_summaries
            WHERE city = $1
              AND source = $2
              AND summary_date BETWEEN $3 AND $4
            ORDER BY summary_date
            "#,
        )
        .bind(city)
        .bind(self.source.as_str())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let source = self.source;
        Ok(rows
            .into_iter()
            .map(|r| DailySummary {
                date: r.summary_date,
                city: r.city,
                avg_temp: r.avg_temp,
                max_temp: r.max_temp,
                min_temp: r.min_temp,
                dominant_condition: r.dominant_condition,
                dominant_condition_count: r.dominant_condition_count.max(0) as u32,
                total_observations: r.total_observations.max(0) as u32,
                source,
            })
            .collect())
    }
}

/// In-memory store used by the pipeline and route tests.
#[cfg(test)]
pub(crate) mod memory {
    // ---
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug)]
    pub(crate) struct MemoryStore {
        source: DataSource,
        pub(crate) observations: Mutex<Vec<Observation>>,
        pub(crate) summaries: Mutex<Vec<DailySummary>>,
        pub(crate) fail_writes: bool,
    }

    impl MemoryStore {
        pub(crate) fn new(source: DataSource) -> Self {
            Self {
                source,
                observations: Mutex::new(Vec::new()),
                summaries: Mutex::new(Vec::new()),
                fail_writes: false,
            }
        }

        pub(crate) fn failing(source: DataSource) -> Self {
            Self {
                fail_writes: true,
                ..Self::new(source)
            }
        }

        fn check_writable(&self) -> Result<()> {
            if self.fail_writes {
                return Err(sqlx::Error::PoolClosed.into());
            }
            Ok(())
        }
    }

    impl Store for MemoryStore {
        fn source(&self) -> DataSource {
            self.source
        }

        async fn store_observation(&self, obs: &Observation) -> Result<()> {
            self.check_writable()?;
            self.observations.lock().unwrap().push(obs.clone());
            Ok(())
        }

        async fn query_observations(
            &self,
            city: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Observation>> {
            let mut found: Vec<Observation> = self
                .observations
                .lock()
                .unwrap()
                .iter()
                .filter(|o| o.source == self.source && o.city == city)
                .filter(|o| o.observed_at >= start && o.observed_at <= end)
                .cloned()
                .collect();
            found.sort_by_key(|o| o.observed_at);
            Ok(found)
        }

        async fn upsert_daily_summary(&self, summary: &DailySummary) -> Result<()> {
            self.check_writable()?;
            let mut summaries = self.summaries.lock().unwrap();
            let existing = summaries.iter_mut().find(|s| {
                s.date == summary.date && s.city == summary.city && s.source == summary.source
            });
            match existing {
                Some(s) => *s = summary.clone(),
                None => summaries.push(summary.clone()),
            }
            Ok(())
        }

        async fn query_daily_summaries(
            &self,
            city: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailySummary>> {
            let mut found: Vec<DailySummary> = self
                .summaries
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.source == self.source && s.city == city)
                .filter(|s| s.date >= start && s.date <= end)
                .cloned()
                .collect();
            found.sort_by_key(|s| s.date);
            Ok(found)
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::memory::MemoryStore;
    use super::*;
    use chrono::TimeZone;

    fn summary(avg_temp: f64) -> DailySummary {
        // ---
        DailySummary {
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            city: "Delhi".to_string(),
            avg_temp,
            max_temp: 40.0,
            min_temp: 20.0,
            dominant_condition: "Clear".to_string(),
            dominant_condition_count: 3,
            total_observations: 4,
            source: DataSource::Mock,
        }
    }

    #[test]
    fn test_upsert_overwrites_same_key() {
        // ---
        let store = MemoryStore::new(DataSource::Mock);

        tokio_test::block_on(async {
            store.upsert_daily_summary(&summary(30.0)).await.unwrap();
            store.upsert_daily_summary(&summary(31.5)).await.unwrap();

            let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
            let stored = store.query_daily_summaries("Delhi", day, day).await.unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].avg_temp, 31.5);
        });
    }

    #[test]
    fn test_summary_keeps_its_own_source() {
        // ---
        let store = MemoryStore::new(DataSource::Mock);
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let real = DailySummary {
            source: DataSource::Real,
            ..summary(33.0)
        };

        tokio_test::block_on(async {
            store.upsert_daily_summary(&summary(30.0)).await.unwrap();
            store.upsert_daily_summary(&real).await.unwrap();

            // the real row is a separate key and invisible to a mock store
            let stored = store.query_daily_summaries("Delhi", day, day).await.unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].avg_temp, 30.0);
            assert_eq!(store.summaries.lock().unwrap().len(), 2);
        });
    }

    #[test]
    fn test_query_window_is_inclusive() {
        // ---
        let store = MemoryStore::new(DataSource::Real);
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        tokio_test::block_on(async {
            for minutes in [0, 10, 20, 30] {
                let obs = Observation {
                    city: "Delhi".to_string(),
                    condition: "Clear".to_string(),
                    description: "clear sky".to_string(),
                    temperature: 30.0,
                    feels_like: None,
                    observed_at: t0 + chrono::Duration::minutes(minutes),
                    source: DataSource::Real,
                };
                store.store_observation(&obs).await.unwrap();
            }

            let found = store
                .query_observations("Delhi", t0 + chrono::Duration::minutes(10), t0 + chrono::Duration::minutes(20))
                .await
                .unwrap();
            assert_eq!(found.len(), 2);
            assert!(store.query_observations("Mumbai", t0, t0).await.unwrap().is_empty());
        });
    }
}
