//! In-memory state store

use crate::document::{decode, encode};
use crate::{AlertLedger, StateStore, StorageError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Store keeping the serialized document in memory (for testing and dry runs)
#[derive(Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
    commits: AtomicUsize,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a raw stored document, which may be corrupt
    pub fn with_document(text: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(text.into())),
            ..Default::default()
        }
    }

    /// Raw stored document, if any
    pub fn document(&self) -> Option<String> {
        self.document.lock().ok().and_then(|d| d.clone())
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make subsequent commits fail
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<AlertLedger, StorageError> {
        let document = self
            .document
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("Lock error: {}", e)))?;
        match document.as_deref() {
            Some(text) => decode(&self.location(), text),
            None => Ok(AlertLedger::new()),
        }
    }

    fn commit(&self, ledger: &AlertLedger) -> Result<(), StorageError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("commit rejected".to_string()));
        }
        let text = encode(ledger)?;
        let mut document = self
            .document
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("Lock error: {}", e)))?;
        *document = Some(text);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn quarantine(&self) -> Result<Option<PathBuf>, StorageError> {
        // Nowhere to copy to; the next commit replaces the document
        Ok(None)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
