//! Per-session accounting.
//!
//! A [`StudySession`] is started when a review session begins, receives one
//! [`StudySession::record`] per rating (in the same order the ratings were
//! passed to the scheduler), and is frozen by [`StudySession::finish`].

use crate::{Error, Rating, RatingHistogram, Result, StudySession};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// End-of-session report
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub reviewed: u32,
    pub correct: u32,
    pub incorrect: u32,
    /// Share of ratings that were Good or Easy; None for an empty session
    pub accuracy: Option<f64>,
    pub histogram: RatingHistogram,
    pub elapsed_seconds: i64,
    pub average_answer_ms: Option<u64>,
}

impl StudySession {
    pub fn start(now: DateTime<Utc>) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            started_at: now,
            ended_at: None,
            reviewed: 0,
            correct: 0,
            incorrect: 0,
            histogram: RatingHistogram::default(),
            answer_time_ms: 0,
            timed_answers: 0,
        };
        tracing::debug!("Started study session {}", session.id);
        session
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Count one rating. Fails if the session was already finished.
    pub fn record(&mut self, rating: Rating, time_to_answer: Option<Duration>) -> Result<()> {
        if self.is_finished() {
            return Err(Error::SessionFinished(self.id));
        }

        self.reviewed += 1;
        if rating.is_correct() {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
        self.histogram.increment(rating);

        if let Some(elapsed) = time_to_answer {
            self.answer_time_ms += elapsed.num_milliseconds().max(0) as u64;
            self.timed_answers += 1;
        }

        Ok(())
    }

    /// Freeze the session. Finishing twice keeps the first end time.
    pub fn finish(&mut self, now: DateTime<Utc>) -> &StudySession {
        if self.ended_at.is_none() {
            self.ended_at = Some(now.max(self.started_at));
            tracing::info!(
                "Finished session {}: {} reviewed, {} correct",
                self.id,
                self.reviewed,
                self.correct
            );
        }
        self
    }

    pub fn accuracy(&self) -> Option<f64> {
        if self.reviewed == 0 {
            None
        } else {
            Some(f64::from(self.correct) / f64::from(self.reviewed))
        }
    }

    pub fn average_answer_time(&self) -> Option<Duration> {
        if self.timed_answers == 0 {
            None
        } else {
            let average = self.answer_time_ms / u64::from(self.timed_answers);
            Some(Duration::milliseconds(average as i64))
        }
    }

    /// Wall time covered by the session; `now` is only used while it is active
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).max(Duration::zero())
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            reviewed: self.reviewed,
            correct: self.correct,
            incorrect: self.incorrect,
            accuracy: self.accuracy(),
            histogram: self.histogram,
            elapsed_seconds: self.elapsed(now).num_seconds(),
            average_answer_ms: self
                .average_answer_time()
                .map(|d| d.num_milliseconds() as u64),
        }
    }
}
