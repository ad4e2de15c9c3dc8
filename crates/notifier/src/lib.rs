//! Notification Transports
//!
//! Posts rendered notices. Every send is independently fallible; callers
//! decide what a failure means for persisted state.

mod bluesky;
mod dry_run;

pub use bluesky::{BlueskyConfig, BlueskyCredentials, BlueskyTransport, MAX_POST_CHARS};
pub use dry_run::LogTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Send timed out after {0}ms")]
    Timeout(u64),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Http(format!("request timed out: {}", err))
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Posts a text notification
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Short description for logs
    fn describe(&self) -> String;
}
