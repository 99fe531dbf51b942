//! Error types for the recall_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for recall_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller handed the scheduler something it must never see
    /// (out-of-range rating, inconsistent card state, time running backwards).
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// A rating was recorded against a session that was already finished
    #[error("Session {0} is already finished")]
    SessionFinished(uuid::Uuid),

    /// No card with the given id exists in the deck
    #[error("Card not found: {0}")]
    CardNotFound(String),

    /// A card with the given id already exists in the deck
    #[error("Duplicate card id: {0}")]
    DuplicateCard(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
