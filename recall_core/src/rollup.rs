//! CSV rollup for archiving the review-event WAL.
//!
//! Converts the WAL to CSV without losing events: the CSV is synced before the
//! WAL is emptied, the raw WAL is kept in a `.wal.processed` archive, and the
//! WAL is locked throughout so concurrent appends are never dropped.

use crate::{CardState, Error, Rating, Result, ReviewEvent, SchedulingSnapshot};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use uuid::Uuid;

/// A row in the CSV archive
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EventRow {
    id: String,
    card_id: String,
    session_id: String,
    rating: u8,
    reviewed_at: String,
    time_to_answer_ms: Option<u64>,
    elapsed_days: f64,
    scheduled_days: f64,
    difficulty_before: f64,
    stability_before: f64,
    state_before: CardState,
    difficulty_after: f64,
    stability_after: f64,
    state_after: CardState,
}

impl From<&ReviewEvent> for EventRow {
    fn from(event: &ReviewEvent) -> Self {
        EventRow {
            id: event.id.to_string(),
            card_id: event.card_id.clone(),
            session_id: event.session_id.to_string(),
            rating: event.rating.value(),
            reviewed_at: event.reviewed_at.to_rfc3339(),
            time_to_answer_ms: event.time_to_answer_ms,
            elapsed_days: event.elapsed_days,
            scheduled_days: event.scheduled_days,
            difficulty_before: event.before.difficulty,
            stability_before: event.before.stability,
            state_before: event.before.state,
            difficulty_after: event.after.difficulty,
            stability_after: event.after.stability,
            state_after: event.after.state,
        }
    }
}

impl TryFrom<EventRow> for ReviewEvent {
    type Error = Error;

    fn try_from(row: EventRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Other(format!("Invalid event UUID: {}", e)))?;
        let session_id = Uuid::parse_str(&row.session_id)
            .map_err(|e| Error::Other(format!("Invalid session UUID: {}", e)))?;
        let reviewed_at = DateTime::parse_from_rfc3339(&row.reviewed_at)
            .map_err(|e| Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        Ok(ReviewEvent {
            id,
            card_id: row.card_id,
            session_id,
            rating: Rating::try_from(row.rating)?,
            reviewed_at,
            time_to_answer_ms: row.time_to_answer_ms,
            elapsed_days: row.elapsed_days,
            scheduled_days: row.scheduled_days,
            before: SchedulingSnapshot {
                difficulty: row.difficulty_before,
                stability: row.stability_before,
                state: row.state_before,
            },
            after: SchedulingSnapshot {
                difficulty: row.difficulty_after,
                stability: row.stability_after,
                state: row.state_after,
            },
        })
    }
}

/// Roll up WAL review events into CSV and archive the WAL
///
/// The WAL stays exclusively locked for the whole rollup, so appends from
/// other processes wait and land in the emptied log afterwards. This function:
/// 1. Reads all events from the WAL
/// 2. Appends them to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Appends the raw WAL contents to `.wal.processed`
/// 5. Truncates the WAL in place
/// 6. Returns the number of events processed
pub fn events_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    if !wal_path.exists() {
        return Ok(0);
    }

    let mut wal = OpenOptions::new().read(true).write(true).open(wal_path)?;
    wal.lock_exclusive()?;
    let result = archive_locked(&mut wal, wal_path, csv_path);
    wal.unlock()?;
    result
}

fn archive_locked(wal: &mut File, wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let mut contents = Vec::new();
    wal.read_to_end(&mut contents)?;
    let events = crate::wal::parse_events(contents.as_slice())?;

    if events.is_empty() {
        tracing::info!("No review events in WAL to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Headers only go into a fresh file
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for event in &events {
        writer.serialize(EventRow::from(event))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} review events to CSV", events.len());

    // Unparsable lines survive here for manual recovery
    let processed_path = wal_path.with_extension("wal.processed");
    let mut processed = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&processed_path)?;
    processed.write_all(&contents)?;
    processed.sync_all()?;

    wal.set_len(0)?;
    wal.sync_all()?;

    tracing::info!("Archived WAL to {:?}", processed_path);

    Ok(events.len())
}

/// Clean up old processed WAL files
///
/// This removes all .wal.processed files in the given directory.
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed WAL: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }

    Ok(count)
}
