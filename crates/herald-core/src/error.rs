use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for Herald.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The feed source was rejected before or after fetching
    /// (bad URL, non-200 status, non-XML content type, private address).
    #[error("Invalid feed source: {0}")]
    InvalidFeedSource(String),

    /// HTTP request could not be completed (DNS, connect, TLS, reset).
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// Request timed out. Carries the limit in milliseconds.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The response body is not a well-formed RSS or Atom document.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A unique constraint was hit while inserting (lost a create race).
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration value missing or out of range.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error describes a bad feed source rather than
    /// an infrastructure failure.
    ///
    /// Rejections are reported back to the caller as a structured outcome;
    /// everything else is surfaced as an internal error.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AppError::InvalidFeedSource(_)
                | AppError::FetchError(_)
                | AppError::Timeout(_)
                | AppError::ParseError(_)
        )
    }
}

/// Whole milliseconds in `duration`, saturating, for [`AppError::Timeout`].
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
