use thiserror::Error;

/// Errors from the credential store and the token refresh flow.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("integration not found: {id}")]
    NotFound { id: i64 },

    /// The refresh token was rejected or is missing. The user has to
    /// reconnect the platform; retrying will not help.
    #[error("authorization expired: {0}")]
    AuthExpired(String),

    /// The token endpoint did not answer within the request deadline.
    #[error("token refresh timed out")]
    Timeout,

    /// Network failure talking to the token endpoint.
    #[error("token endpoint unavailable: {0}")]
    Unavailable(String),

    /// OAuth client credentials are missing from config.
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl From<reqwest::Error> for IntegrationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IntegrationError::Timeout
        } else {
            IntegrationError::Unavailable(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, IntegrationError>;
