//! Core domain types for the Recall scheduler.
//!
//! This module defines the fundamental types used throughout the system:
//! - Ratings and card lifecycle states
//! - Per-card scheduling state and the cards that own it
//! - Review events emitted for every rating
//! - Study sessions and their running counts

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lower bound for card difficulty
pub const MIN_DIFFICULTY: f64 = 1.0;

/// Upper bound for card difficulty
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Difficulty a card carries before its first rating
pub const DEFAULT_DIFFICULTY: f64 = 5.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ============================================================================
// Rating
// ============================================================================

/// Recall quality reported by the learner, ordered from worst to best.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    /// Every rating, in ascending order
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Numeric value on the 1-4 scale
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Good and Easy count as correct answers; Again and Hard do not
    pub fn is_correct(self) -> bool {
        self >= Rating::Good
    }

    /// Zero-based position, used to index per-rating tables
    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(Error::ContractViolation(format!(
                "rating must be between 1 and 4, got {}",
                other
            ))),
        }
    }
}

impl FromStr for Rating {
    type Err = Error;

    /// Accepts either the numeric value ("3") or the name ("good"), case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return Rating::try_from(n);
        }

        match trimmed.to_lowercase().as_str() {
            "again" => Ok(Rating::Again),
            "hard" => Ok(Rating::Hard),
            "good" => Ok(Rating::Good),
            "easy" => Ok(Rating::Easy),
            _ => Err(Error::ContractViolation(format!("unknown rating: {}", s))),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Lifecycle state
// ============================================================================

/// Lifecycle stage of a card within the scheduler
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    #[default]
    New,
    Learning,
    Review,
    Relearning,
}

impl CardState {
    /// Tie-break rank for due-set ordering; lower surfaces first.
    pub fn due_priority(self) -> u8 {
        match self {
            CardState::Relearning => 0,
            CardState::Learning => 1,
            CardState::Review => 2,
            CardState::New => 3,
        }
    }
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardState::New => "new",
            CardState::Learning => "learning",
            CardState::Review => "review",
            CardState::Relearning => "relearning",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Scheduling state
// ============================================================================

/// Scheduling state owned by a single card.
///
/// Only [`crate::Scheduler::update`] produces new values of this type;
/// retrievability is never stored and is derived from `stability` and
/// the time since `last_review_at`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CardSchedulingState {
    pub difficulty: f64,
    /// Days until retrievability decays to the reference retention
    pub stability: f64,
    pub state: CardState,
    pub last_review_at: Option<DateTime<Utc>>,
    pub due_at: DateTime<Utc>,
    pub reps: u32,
    pub lapses: u32,
    #[serde(default)]
    pub current_step_index: usize,
}

impl CardSchedulingState {
    /// A card that has never been rated, due immediately
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            stability: 0.0,
            state: CardState::New,
            last_review_at: None,
            due_at: created_at,
            reps: 0,
            lapses: 0,
            current_step_index: 0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }

    /// Fractional days since the last review (0 for never-reviewed cards)
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> f64 {
        self.last_review_at
            .map(|last| (now - last).num_milliseconds() as f64 / MILLIS_PER_DAY)
            .unwrap_or(0.0)
            .max(0.0)
    }

    pub fn snapshot(&self) -> SchedulingSnapshot {
        SchedulingSnapshot {
            difficulty: self.difficulty,
            stability: self.stability,
            state: self.state,
        }
    }

    /// Check the field-combination invariants every stored state must satisfy
    pub fn validate(&self) -> Result<()> {
        let violation = |msg: String| -> Result<()> { Err(Error::ContractViolation(msg)) };

        if !self.difficulty.is_finite()
            || !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty)
        {
            return violation(format!(
                "difficulty {} outside [{}, {}]",
                self.difficulty, MIN_DIFFICULTY, MAX_DIFFICULTY
            ));
        }

        if !self.stability.is_finite() || self.stability < 0.0 {
            return violation(format!("stability {} must be finite and >= 0", self.stability));
        }

        match self.state {
            CardState::New => {
                if self.reps > 0 || self.last_review_at.is_some() {
                    return violation(format!(
                        "new card has reps={} and last_review_at={:?}",
                        self.reps, self.last_review_at
                    ));
                }
            }
            other => {
                if self.last_review_at.is_none() {
                    return violation(format!("{} card has no last_review_at", other));
                }
                if self.reps == 0 {
                    return violation(format!("{} card has reps=0", other));
                }
                if other == CardState::Review && self.stability <= 0.0 {
                    return violation("review card has zero stability".into());
                }
            }
        }

        Ok(())
    }
}

/// A flashcard as stored by the deck collaborator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub front: String,
    pub back: String,
    /// Suspended cards keep their schedule but are never selected as due
    #[serde(default)]
    pub suspended: bool,
    pub created_at: DateTime<Utc>,
    pub scheduling: CardSchedulingState,
}

impl Card {
    pub fn new(
        id: impl Into<String>,
        front: impl Into<String>,
        back: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            front: front.into(),
            back: back.into(),
            suspended: false,
            created_at,
            scheduling: CardSchedulingState::new(created_at),
        }
    }
}

// ============================================================================
// Review events
// ============================================================================

/// The parts of a scheduling state recorded before and after each rating
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SchedulingSnapshot {
    pub difficulty: f64,
    pub stability: f64,
    pub state: CardState,
}

/// Append-only record of one rating submission
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub id: Uuid,
    pub card_id: String,
    pub session_id: Uuid,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    pub time_to_answer_ms: Option<u64>,
    /// Days since the previous review of this card
    pub elapsed_days: f64,
    /// Days until the card is due again
    pub scheduled_days: f64,
    pub before: SchedulingSnapshot,
    pub after: SchedulingSnapshot,
}

impl ReviewEvent {
    /// An Again rating given to a card that was in review
    pub fn is_lapse(&self) -> bool {
        self.rating == Rating::Again && self.before.state == CardState::Review
    }
}

// ============================================================================
// Study sessions
// ============================================================================

/// Count of ratings given, per rating value
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RatingHistogram {
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl RatingHistogram {
    pub fn increment(&mut self, rating: Rating) {
        match rating {
            Rating::Again => self.again += 1,
            Rating::Hard => self.hard += 1,
            Rating::Good => self.good += 1,
            Rating::Easy => self.easy += 1,
        }
    }

    pub fn count(&self, rating: Rating) -> u32 {
        match rating {
            Rating::Again => self.again,
            Rating::Hard => self.hard,
            Rating::Good => self.good,
            Rating::Easy => self.easy,
        }
    }

    pub fn total(&self) -> u32 {
        self.again + self.hard + self.good + self.easy
    }
}

/// One review session and its running counts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StudySession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// None while the session is active
    pub ended_at: Option<DateTime<Utc>>,
    pub reviewed: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub histogram: RatingHistogram,
    /// Sum of reported answer times
    pub answer_time_ms: u64,
    /// Number of ratings that came with an answer time
    pub timed_answers: u32,
}
