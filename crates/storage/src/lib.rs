//! Storage Layer
//!
//! Persists the entity → `AlertState` ledger between runs. The on-disk form is
//! a single JSON object keyed by entity identifier whose values are
//! `"alerted"` or `"resolved"`; an absent key means `AlertState::None`.

mod document;
mod json_file;
mod memory;

pub use document::{decode, encode};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use alerting::AlertState;
use row_normalizer::EntityId;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Last announced state per entity. `AlertState::None` entries are never stored.
pub type AlertLedger = BTreeMap<EntityId, AlertState>;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("State store at {location} is corrupt: {reason}")]
    Corrupt { location: String, reason: String },
    #[error("State store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("State store is locked by another run: {}", .0.display())]
    Locked(PathBuf),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Persistence contract for the alert ledger
pub trait StateStore: Send + Sync {
    /// Load the ledger. A missing store is an empty ledger, not an error.
    fn load(&self) -> Result<AlertLedger, StorageError>;

    /// Replace the stored ledger wholesale. Readers observe either the old or
    /// the new content, never a mix.
    fn commit(&self, ledger: &AlertLedger) -> Result<(), StorageError>;

    /// Take the single-writer lock for the duration of a run
    fn lock(&self) -> Result<RunLock, StorageError> {
        Ok(RunLock::unguarded())
    }

    /// Preserve an unreadable store before a fresh ledger replaces it. The
    /// store itself is left for the next commit to overwrite.
    /// Returns where the old content was copied, if anywhere.
    fn quarantine(&self) -> Result<Option<PathBuf>, StorageError> {
        Ok(None)
    }

    /// Human readable location, for logs
    fn location(&self) -> String;
}

/// Exclusive run lock, released on drop.
///
/// The lock file carries a per-run token; it is only removed while it still
/// holds that token.
#[derive(Debug)]
pub struct RunLock {
    path: Option<PathBuf>,
    token: String,
}

impl RunLock {
    pub(crate) fn file(path: PathBuf, token: String) -> Self {
        Self {
            path: Some(path),
            token,
        }
    }

    /// A lock for stores that need no cross-process guard
    pub fn unguarded() -> Self {
        Self {
            path: None,
            token: String::new(),
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::read_to_string(&path) {
            Ok(content) if content.contains(&self.token) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to release run lock {}: {}", path.display(), e);
                }
            }
            Ok(_) => warn!(
                "Run lock {} now belongs to another run, leaving it",
                path.display()
            ),
            Err(e) => warn!("Failed to release run lock {}: {}", path.display(), e),
        }
    }
}
