//! Error types for the screener

use thiserror::Error;

/// Result type alias using our ScreenerError
pub type Result<T> = std::result::Result<T, ScreenerError>;

/// Main error type for screener operations
///
/// Only conditions that stop a portfolio from being analysed live here.
/// Suitability findings and unresolved plan items are data on the report.
#[derive(Error, Debug)]
pub enum ScreenerError {
    /// A raw position record is missing a required field or carries an invalid value
    #[error("Malformed position {record}: {reason}")]
    MalformedPosition { record: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reading a position or profile source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A background analysis task panicked or was cancelled
    #[error("Analysis task failed: {0}")]
    TaskJoin(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScreenerError {
    pub fn malformed(record: impl Into<String>, reason: impl Into<String>) -> Self {
        ScreenerError::MalformedPosition {
            record: record.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error was caused by bad input data rather than the environment
    pub fn is_malformed(&self) -> bool {
        matches!(self, ScreenerError::MalformedPosition { .. })
    }
}

impl From<tokio::task::JoinError> for ScreenerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ScreenerError::TaskJoin(err.to_string())
    }
}
