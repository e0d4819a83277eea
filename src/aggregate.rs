//! Daily aggregation of observations into per-(date, city) summaries.

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};

use crate::models::{round2, DailySummary, DataSource, Observation};

// ---

/// Group `observations` by (local date, city) and summarize each group.
///
/// The date is taken in `offset` (the reporting timezone). Non-finite
/// temperatures and empty conditions are ignored; a group left with no usable
/// temperature or no usable condition yields no summary. Output is sorted by
/// date, then city. Empty input gives an empty result.
pub fn daily_summaries(
    observations: &[Observation],
    offset: FixedOffset,
    source: DataSource,
) -> Vec<DailySummary> {
    // ---
    let mut groups: BTreeMap<(NaiveDate, &str), Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        let date = obs.observed_at.with_timezone(&offset).date_naive();
        groups.entry((date, obs.city.as_str())).or_default().push(obs);
    }

    groups
        .into_iter()
        .filter_map(|((date, city), points)| {
            let summary = summarize_group(date, city, &points, source);
            if summary.is_none() {
                tracing::debug!(
                    "Skipping {} on {}: no usable temperature or condition",
                    city,
                    date
                );
            }
            summary
        })
        .collect()
}

fn summarize_group(
    date: NaiveDate,
    city: &str,
    points: &[&Observation],
    source: DataSource,
) -> Option<DailySummary> {
    // ---
    let temps: Vec<f64> = points
        .iter()
        .map(|p| p.temperature)
        .filter(|t| t.is_finite())
        .collect();
    if temps.is_empty() {
        return None;
    }

    let (dominant_condition, dominant_condition_count) =
        dominant(points.iter().map(|p| p.condition.as_str()))?;

    let avg_temp = temps.iter().sum::<f64>() / temps.len() as f64;
    let max_temp = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_temp = temps.iter().copied().fold(f64::INFINITY, f64::min);

    Some(DailySummary {
        date,
        city: city.to_string(),
        avg_temp: round2(avg_temp),
        max_temp: round2(max_temp),
        min_temp: round2(min_temp),
        dominant_condition: dominant_condition.to_string(),
        dominant_condition_count,
        total_observations: temps.len() as u32,
        source,
    })
}

/// Most frequent non-empty condition; ties go to the first one seen.
fn dominant<'a>(conditions: impl Iterator<Item = &'a str>) -> Option<(&'a str, u32)> {
    // ---
    let mut counts: Vec<(&str, u32)> = Vec::new();
    for condition in conditions.filter(|c| !c.is_empty()) {
        match counts.iter_mut().find(|(name, _)| *name == condition) {
            Some((_, n)) => *n += 1,
            None => counts.push((condition, 1)),
        }
    }

    counts
        .into_iter()
        .fold(None, |best: Option<(&str, u32)>, (name, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((name, n)),
        })
}
