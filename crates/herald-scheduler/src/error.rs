use thiserror::Error;

use crate::types::ItemStatus;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Malformed schedule request; nothing was stored.
    #[error("Invalid schedule: {0}")]
    Validation(String),

    /// The id does not exist, is not owned by the caller, or is not in a
    /// state that allows the operation.
    #[error("Scheduled item not found: {id}")]
    NotFound { id: String },

    /// A store transition matched no row in the expected source state.
    #[error("Cannot move item {id} to {to}: not in the required state")]
    InvalidTransition { id: String, to: ItemStatus },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl SchedulerError {
    /// Short error code string returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) => "DATABASE_ERROR",
            SchedulerError::Validation(_) => "VALIDATION_ERROR",
            SchedulerError::NotFound { .. } => "NOT_FOUND",
            SchedulerError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SchedulerError::Serialization(_) => "SERIALIZATION_ERROR",
            SchedulerError::LockPoisoned => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
