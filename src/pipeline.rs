//! Ingestion driver.
//!
//! One `Pipeline` owns the alert state and is driven sequentially: fetch or
//! generate raw readings, normalize them, persist each observation, run it
//! through the alert detector, and periodically fold stored observations into
//! daily summaries.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::aggregate::daily_summaries;
use crate::alerts::{AlertDetector, AlertSink};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::feed::{Feed, FeedSource};
use crate::models::{AlertEvent, DailySummary, Observation, RawReading};
use crate::store::Store;
use crate::units::TemperatureUnit;

// ---

/// Outcome of one ingestion batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub observations: Vec<Observation>,
    pub alerts: Vec<AlertEvent>,
    /// Readings dropped by validation or absent from the feed.
    pub skipped: usize,
}

pub struct Pipeline<S, F, K> {
    store: S,
    feed: F,
    sink: K,
    detector: AlertDetector,
    cities: Vec<String>,
    unit: TemperatureUnit,
    offset: FixedOffset,
}

impl<S, F, K> Pipeline<S, F, K>
where
    S: Store,
    F: FeedSource,
    K: AlertSink,
{
    // ---
    pub fn new(store: S, feed: F, sink: K, config: &Config) -> Self {
        Self {
            store,
            feed,
            sink,
            detector: AlertDetector::new(config.alert_thresholds),
            cities: config.cities.clone(),
            unit: config.unit,
            offset: config.report_offset,
        }
    }

    pub fn detector(&self) -> &AlertDetector {
        &self.detector
    }

    /// Normalize, store and alert-check a batch of raw readings in order.
    ///
    /// Invalid readings are skipped. A storage failure aborts the batch and is
    /// returned; observations stored before it stay stored.
    pub async fn ingest(&mut self, readings: Vec<RawReading>) -> Result<IngestReport> {
        // ---
        let source = self.store.source();
        let mut report = IngestReport::default();

        for raw in readings {
            let Some(obs) = raw.to_observation(self.unit, source) else {
                debug!("Dropping invalid reading: {:?}", raw);
                report.skipped += 1;
                continue;
            };

            self.store.store_observation(&obs).await?;

            let alert = self
                .detector
                .check_alert_at(&obs.city, obs.temperature, obs.observed_at);
            if let Some(event) = alert {
                self.sink.notify(&event);
                report.alerts.push(event);
            }
            report.observations.push(obs);
        }

        debug!(
            "Ingested {} observations ({} skipped, {} alerts)",
            report.observations.len(),
            report.skipped,
            report.alerts.len()
        );
        Ok(report)
    }

    /// Fetch the current reading for every configured city and ingest them.
    pub async fn poll_once(&mut self) -> Result<IngestReport> {
        // ---
        let mut readings = Vec::with_capacity(self.cities.len());
        let mut absent = 0;

        for city in &self.cities {
            match self.feed.fetch(city).await {
                Some(raw) => readings.push(raw),
                None => {
                    debug!("No reading for {} this tick", city);
                    absent += 1;
                }
            }
        }

        let mut report = self.ingest(readings).await?;
        report.skipped += absent;
        Ok(report)
    }

    /// Recompute and upsert summaries for all cities over the whole reporting
    /// days that `[start, end]` touches.
    pub async fn summarize(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailySummary>> {
        summarize_window(&self.store, &self.cities, self.offset, start, end).await
    }

    /// Poll forever at `update_interval`. Every `summary_interval` today's
    /// summaries are refreshed, and when the reporting date rolls over the
    /// days that closed are finalized (see [`due_windows`]). Storage failures
    /// are logged and the loop carries on with the next tick.
    pub async fn run(mut self, update_interval: Duration, summary_interval: Duration) {
        // ---
        let mut ticker = tokio::time::interval(update_interval);
        let mut last_summary = tokio::time::Instant::now();
        let mut current_day = Utc::now().with_timezone(&self.offset).date_naive();

        info!(
            "Polling {} cities every {:?}, summaries every {:?}",
            self.cities.len(),
            update_interval,
            summary_interval
        );

        loop {
            ticker.tick().await;

            match self.poll_once().await {
                Ok(report) => info!(
                    "Tick stored {} observations ({} skipped, {} alerts)",
                    report.observations.len(),
                    report.skipped,
                    report.alerts.len()
                ),
                Err(e) => error!("Ingestion tick failed: {}", e),
            }

            let now = Utc::now();
            let today = now.with_timezone(&self.offset).date_naive();
            if today > current_day {
                info!("Day {} closed, finalizing its summaries", current_day);
            }

            let refresh_due = last_summary.elapsed() >= summary_interval;
            for (start, end) in due_windows(current_day, now, self.offset, refresh_due) {
                if let Err(e) = self.summarize(start, end).await {
                    error!("Failed to summarize {} .. {}: {}", start, end, e);
                }
            }
            if refresh_due {
                last_summary = tokio::time::Instant::now();
            }
            current_day = today;
        }
    }
}

impl<S, K> Pipeline<S, Feed, K>
where
    S: Store,
    K: AlertSink,
{
    /// Ingest a generated history over `[start, end]` when running on mock
    /// data. With a live feed there is nothing to backfill.
    pub async fn backfill(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<IngestReport> {
        // ---
        let readings = match &self.feed {
            Feed::Mock(mock) => {
                mock.with_rng(|generator, rng| generator.generate(&self.cities, start, end, rng))
            }
            Feed::Live(_) => {
                warn!("Backfill requested with a live feed, skipping");
                return Ok(IngestReport::default());
            }
        };

        info!("Backfilling {} mock readings from {} to {}", readings.len(), start, end);
        self.ingest(readings).await
    }
}

/// Query, aggregate and upsert daily summaries for each city over
/// `[start, end]`.
///
/// The window is first widened to the whole reporting days it touches, so an
/// upserted summary always covers its full day and never replaces a complete
/// row with one built from part of the day. Every city is attempted. Storage failures are logged per city and the first
/// one is returned once all cities have been processed; summaries written for
/// other cities remain written.
pub async fn summarize_window<S: Store>(
    store: &S,
    cities: &[String],
    offset: FixedOffset,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DailySummary>> {
    // ---
    let (start, end) =
        whole_days(start, end, offset).ok_or(PipelineError::InvalidWindow { start, end })?;
    let mut written = Vec::new();
    let mut first_error: Option<PipelineError> = None;

    for city in cities {
        match summarize_city(store, city, offset, start, end).await {
            Ok(summaries) => {
                if summaries.is_empty() {
                    debug!("No summaries generated for {}", city);
                }
                for s in &summaries {
                    debug!(
                        "{} {}: avg {:.2} max {:.2} min {:.2}, {} ({}x), {} observations",
                        s.city,
                        s.date,
                        s.avg_temp,
                        s.max_temp,
                        s.min_temp,
                        s.dominant_condition,
                        s.dominant_condition_count,
                        s.total_observations
                    );
                }
                written.extend(summaries);
            }
            Err(e) => {
                error!("Error processing daily summaries for {}: {}", city, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!("Upserted {} daily summaries", written.len());
            Ok(written)
        }
    }
}

async fn summarize_city<S: Store>(
    store: &S,
    city: &str,
    offset: FixedOffset,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DailySummary>> {
    // ---
    let observations = store.query_observations(city, start, end).await?;
    let summaries = daily_summaries(&observations, offset, store.source());

    for summary in &summaries {
        store.upsert_daily_summary(summary).await?;
    }
    Ok(summaries)
}

/// Whole-day windows the polling loop must summarize at `now`.
///
/// `current_day` is the reporting date the loop last saw. Days that closed
/// since then are finalized in one window; when `refresh_due`, today is
/// refreshed as well.
pub fn due_windows(
    current_day: NaiveDate,
    now: DateTime<Utc>,
    offset: FixedOffset,
    refresh_due: bool,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    // ---
    let today = now.with_timezone(&offset).date_naive();
    let mut windows = Vec::new();

    if today > current_day {
        if let Some(last_closed) = today.pred_opt() {
            windows.push((
                day_bounds(current_day, offset).0,
                day_bounds(last_closed, offset).1,
            ));
        }
    }
    if refresh_due {
        windows.push(day_bounds(today, offset));
    }
    windows
}

/// Widen `[start, end]` to the whole reporting days it touches in `offset`.
/// `None` when those bounds fall outside the representable range.
pub fn whole_days(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    // ---
    let first = start.with_timezone(&offset).date_naive();
    let last = end.with_timezone(&offset).date_naive();

    let from = local_midnight(first, offset)?;
    let to = local_midnight(last.succ_opt()?, offset)?
        .checked_sub_signed(TimeDelta::microseconds(1))?;
    Some((from, to))
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    date.and_time(NaiveTime::MIN)
        .checked_sub_signed(TimeDelta::seconds(offset.local_minus_utc() as i64))
        .map(|utc| utc.and_utc())
}

/// UTC instants covering the whole local `date` in `offset`, inclusive.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    // ---
    let local_midnight = date.and_time(NaiveTime::MIN);
    let start = (local_midnight - TimeDelta::seconds(offset.local_minus_utc() as i64)).and_utc();
    let end = start + TimeDelta::days(1) - TimeDelta::microseconds(1);
    (start, end)
}
