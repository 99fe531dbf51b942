//! Write-Ahead Log (WAL) for review events and finished sessions.
//!
//! Records are appended to JSONL (JSON Lines) files with file locking
//! to ensure safe concurrent access.

use crate::{Result, ReviewEvent, StudySession};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for review events emitted by the scheduler
pub trait EventSink {
    fn append(&mut self, event: &ReviewEvent) -> Result<()>;
}

/// Destination for finished study sessions
pub trait SessionSink {
    fn append_session(&mut self, session: &StudySession) -> Result<()>;
}

/// JSONL-based sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn append_line<T: Serialize>(&self, record: &T) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;
        Ok(())
    }
}

impl EventSink for JsonlSink {
    fn append(&mut self, event: &ReviewEvent) -> Result<()> {
        self.append_line(event)?;
        tracing::debug!("Appended review event {} to WAL", event.id);
        Ok(())
    }
}

impl SessionSink for JsonlSink {
    fn append_session(&mut self, session: &StudySession) -> Result<()> {
        self.append_line(session)?;
        tracing::debug!("Appended session {} to WAL", session.id);
        Ok(())
    }
}

/// Read every parsable record from a JSONL file; unparsable lines are skipped
fn read_records<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;
    let records = parse_lines(BufReader::new(&file), kind);
    file.unlock()?;

    let records = records?;
    tracing::debug!("Read {} {}s from {:?}", records.len(), kind, path);
    Ok(records)
}

fn parse_lines<T: DeserializeOwned>(reader: impl BufRead, kind: &str) -> Result<Vec<T>> {
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse {} at line {}: {}", kind, line_num + 1, e);
            }
        }
    }

    Ok(records)
}

/// Parse review events from WAL contents the caller already holds a lock on
pub(crate) fn parse_events(reader: impl BufRead) -> Result<Vec<ReviewEvent>> {
    parse_lines(reader, "review event")
}

/// Read all review events from a WAL file
pub fn read_events(path: &Path) -> Result<Vec<ReviewEvent>> {
    read_records(path, "review event")
}

/// Read all finished sessions from a WAL file
pub fn read_sessions(path: &Path) -> Result<Vec<StudySession>> {
    read_records(path, "session")
}
