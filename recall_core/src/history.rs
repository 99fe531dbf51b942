//! Review history loading and aggregate statistics.
//!
//! Recent review events are read from both the WAL and the CSV archive,
//! so statistics stay correct across rollups.

use crate::rollup::EventRow;
use crate::{Error, RatingHistogram, Result, ReviewEvent};
use chrono::{DateTime, Duration, Utc};
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Start of a window covering the last `days` days before `now`
pub fn window_start(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    if days < 0 {
        return Err(Error::Config(format!("history window must not be negative, got {} days", days)));
    }
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| Error::Config(format!("history window of {} days is out of range", days)))
}

/// Load review events from the last `days` days from both WAL and CSV
///
/// Returns events sorted by reviewed_at (newest first).
/// Events that appear in both WAL and CSV are counted once.
pub fn load_recent_events(
    wal_path: &Path,
    csv_path: &Path,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<ReviewEvent>> {
    let cutoff = window_start(now, days)?;
    let mut events = Vec::new();
    let mut seen_ids = HashSet::new();

    if wal_path.exists() {
        for event in crate::wal::read_events(wal_path)? {
            if event.reviewed_at >= cutoff && seen_ids.insert(event.id) {
                events.push(event);
            }
        }
        tracing::debug!("Loaded {} events from WAL", events.len());
    }

    if csv_path.exists() {
        let mut csv_count = 0;
        for event in load_events_from_csv(csv_path)? {
            if event.reviewed_at >= cutoff && seen_ids.insert(event.id) {
                events.push(event);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} events from CSV", csv_count);
    }

    events.sort_by(|a, b| b.reviewed_at.cmp(&a.reviewed_at));

    tracing::info!(
        "Loaded {} review events from last {} days",
        events.len(),
        days
    );

    Ok(events)
}

/// Load all review events from a CSV archive, skipping malformed rows
fn load_events_from_csv(path: &Path) -> Result<Vec<ReviewEvent>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut events = Vec::new();

    for (row_num, result) in reader.deserialize::<EventRow>().enumerate() {
        let parsed = result
            .map_err(crate::Error::from)
            .and_then(ReviewEvent::try_from);
        match parsed {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!("Skipping CSV row {}: {}", row_num + 1, e);
            }
        }
    }

    Ok(events)
}

/// Aggregate statistics over a set of review events
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ReviewStats {
    pub total: usize,
    pub histogram: RatingHistogram,
    /// Share of Good/Easy ratings; None when there are no events
    pub retention_rate: Option<f64>,
    /// Again ratings given to cards in review
    pub lapses: usize,
    pub distinct_cards: usize,
    pub average_answer_ms: Option<u64>,
}

impl ReviewStats {
    pub fn from_events(events: &[ReviewEvent]) -> Self {
        let mut stats = ReviewStats {
            total: events.len(),
            ..Default::default()
        };

        let mut cards = HashSet::new();
        let mut correct = 0usize;
        let mut answer_ms = 0u64;
        let mut timed = 0u64;

        for event in events {
            stats.histogram.increment(event.rating);
            if event.rating.is_correct() {
                correct += 1;
            }
            if event.is_lapse() {
                stats.lapses += 1;
            }
            if let Some(ms) = event.time_to_answer_ms {
                answer_ms += ms;
                timed += 1;
            }
            cards.insert(event.card_id.as_str());
        }

        stats.distinct_cards = cards.len();
        if stats.total > 0 {
            stats.retention_rate = Some(correct as f64 / stats.total as f64);
        }
        if timed > 0 {
            stats.average_answer_ms = Some(answer_ms / timed);
        }

        stats
    }
}
