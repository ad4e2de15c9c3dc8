//! Fatal run errors. The ledger is never committed when one of these is returned.

use sheet_source::SourceError;
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[source] SourceError),

    #[error("State store corrupt: {0}")]
    StoreCorrupt(#[source] StorageError),

    #[error("State store locked: {0}")]
    StoreLocked(#[source] StorageError),

    #[error("State store error: {0}")]
    Store(#[source] StorageError),
}

impl From<StorageError> for RunError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupt { .. } => RunError::StoreCorrupt(err),
            StorageError::Locked(_) => RunError::StoreLocked(err),
            other => RunError::Store(other),
        }
    }
}
