//! Source Error Types

use thiserror::Error;

/// Errors fetching the status feed. All of them are fatal for a run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Feed could not be reached
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Credentials rejected or unusable
    #[error("Source authentication failed: {0}")]
    Auth(String),

    /// Feed answered with something that is not a table
    #[error("Malformed feed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Unavailable(err.to_string())
    }
}
