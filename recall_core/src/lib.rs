#![forbid(unsafe_code)]

//! Core domain model and scheduling logic for Recall.
//!
//! This crate provides:
//! - Domain types (ratings, card scheduling state, review events, sessions)
//! - The spaced-repetition scheduler
//! - Due-set selection and session accounting
//! - Configuration and logging setup
//! - File-backed persistence (deck, WAL, CSV archive, history)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod deck;
pub mod wal;
pub mod rollup;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, SchedulerConfig, SchedulerWeights, StudyConfig};
pub use scheduler::{Preview, ReviewOutcome, Scheduler};
pub use selector::{due_counts, select_due, DueCounts};
pub use session::SessionSummary;
pub use deck::Deck;
pub use wal::{EventSink, JsonlSink, SessionSink};
pub use history::{load_recent_events, window_start, ReviewStats};
