//! JSON file state store

use crate::document::{decode, encode};
use crate::{AlertLedger, RunLock, StateStore, StorageError};
use chrono::Utc;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default age after which an abandoned run lock is taken over
const DEFAULT_STALE_LOCK: Duration = Duration::from_secs(3600);

/// Ledger stored as a single JSON document.
///
/// Commits write a sibling `.tmp` file, fsync it, then rename it over the
/// target, so a crash leaves either the previous or the new document.
pub struct JsonFileStore {
    path: PathBuf,
    stale_lock_after: Duration,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_lock_after: DEFAULT_STALE_LOCK,
        }
    }

    /// Set how old a lock file must be before a new run may take it over
    pub fn with_stale_lock_after(mut self, after: Duration) -> Self {
        self.stale_lock_after = after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("alert-state"));
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn try_create_lock(&self, lock_path: &Path, token: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)?;
        writeln!(
            file,
            "{{\"pid\":{},\"token\":\"{}\",\"acquired_at\":\"{}\"}}",
            std::process::id(),
            token,
            Utc::now().to_rfc3339()
        )?;
        file.sync_all()
    }

    /// Replace a stale lock whose content was `observed`.
    ///
    /// The lock is renamed aside first, so of several runs taking over the
    /// same lock only one can move it. A run that moved a lock other than the
    /// one it judged stale puts it back and reports `Locked`.
    fn take_over_stale(
        &self,
        lock_path: &Path,
        observed: &str,
        token: &str,
    ) -> Result<(), StorageError> {
        let aside = self.sibling(&format!(".lock.stale-{}", token));
        match fs::rename(lock_path, &aside) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::Locked(lock_path.to_path_buf()));
            }
            Err(e) => return Err(StorageError::io(lock_path, e)),
        }

        let moved = fs::read_to_string(&aside).unwrap_or_default();
        if moved != observed {
            // Another run already replaced the stale lock
            if let Err(e) = fs::hard_link(&aside, lock_path) {
                warn!("Failed to restore run lock {}: {}", lock_path.display(), e);
            }
            if let Err(e) = fs::remove_file(&aside) {
                warn!("Failed to remove {}: {}", aside.display(), e);
            }
            return Err(StorageError::Locked(lock_path.to_path_buf()));
        }

        if let Err(e) = fs::remove_file(&aside) {
            warn!("Failed to remove stale lock {}: {}", aside.display(), e);
        }
        self.try_create_lock(lock_path, token).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StorageError::Locked(lock_path.to_path_buf()),
            _ => StorageError::io(lock_path, e),
        })
    }

    fn lock_is_stale(&self, lock_path: &Path) -> bool {
        fs::metadata(lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map_or(false, |age| age >= self.stale_lock_after)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<AlertLedger, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No state file at {}, starting cold", self.path.display());
                return Ok(AlertLedger::new());
            }
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let ledger = decode(&self.location(), &text)?;
        debug!("Loaded {} entries from {}", ledger.len(), self.path.display());
        Ok(ledger)
    }

    fn commit(&self, ledger: &AlertLedger) -> Result<(), StorageError> {
        let text = encode(ledger)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let tmp_path = self.sibling(".tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
            file.write_all(text.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| StorageError::io(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| StorageError::io(&self.path, e))?;

        // Persist the rename itself
        #[cfg(unix)]
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
                warn!("Failed to sync directory {}: {}", parent.display(), e);
            }
        }

        debug!("Committed {} entries to {}", ledger.len(), self.path.display());
        Ok(())
    }

    fn lock(&self) -> Result<RunLock, StorageError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let token = Uuid::new_v4().to_string();
        match self.try_create_lock(&lock_path, &token) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let observed = fs::read_to_string(&lock_path).map_err(|e| match e.kind() {
                    ErrorKind::NotFound => StorageError::Locked(lock_path.clone()),
                    _ => StorageError::io(&lock_path, e),
                })?;
                if !self.lock_is_stale(&lock_path) {
                    return Err(StorageError::Locked(lock_path));
                }
                warn!(
                    "Taking over stale run lock {} (older than {:?})",
                    lock_path.display(),
                    self.stale_lock_after
                );
                self.take_over_stale(&lock_path, &observed, &token)?;
            }
            Err(e) => return Err(StorageError::io(&lock_path, e)),
        }

        debug!("Acquired run lock {}", lock_path.display());
        Ok(RunLock::file(lock_path, token))
    }

    fn quarantine(&self) -> Result<Option<PathBuf>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let target = self.sibling(&format!(".corrupt-{}", Utc::now().timestamp()));
        fs::copy(&self.path, &target).map_err(|e| StorageError::io(&target, e))?;
        warn!(
            "Copied unreadable state file {} to {}",
            self.path.display(),
            target.display()
        );
        Ok(Some(target))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::AlertState;
    use proptest::prelude::*;
    use row_normalizer::EntityId;

    fn id(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    #[test]
    fn test_missing_file_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_commit_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/state.json"));

        let mut ledger = AlertLedger::new();
        ledger.insert(id("7"), AlertState::Alerted);
        ledger.insert(id("9"), AlertState::Resolved);
        store.commit(&ledger).unwrap();

        ledger.remove(&id("9"));
        store.commit(&ledger).unwrap();

        assert_eq!(store.load().unwrap(), ledger);
        assert!(!dir.path().join("nested/state.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_quarantine_copies_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2]").unwrap();

        let store = JsonFileStore::new(&path);
        let copy = store.quarantine().unwrap().unwrap();
        assert_eq!(fs::read_to_string(copy).unwrap(), "[1, 2]");
        // Left in place until a commit replaces it
        assert_eq!(fs::read_to_string(&path).unwrap(), "[1, 2]");

        let mut ledger = AlertLedger::new();
        ledger.insert(id("7"), AlertState::Alerted);
        store.commit(&ledger).unwrap();
        assert_eq!(store.load().unwrap(), ledger);
    }

    #[test]
    fn test_quarantine_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert_eq!(store.quarantine().unwrap(), None);
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        let lock = store.lock().unwrap();
        assert!(lock.path().unwrap().exists());
        assert!(matches!(store.lock(), Err(StorageError::Locked(_))));

        drop(lock);
        assert!(store.lock().is_ok());
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            JsonFileStore::new(dir.path().join("state.json")).with_stale_lock_after(Duration::ZERO);

        let abandoned = store.lock().unwrap();
        std::mem::forget(abandoned);

        let lock = store.lock().unwrap();
        assert!(lock.path().unwrap().exists());
    }

    #[test]
    fn test_concurrent_takeover_of_stale_lock_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            JsonFileStore::new(dir.path().join("state.json")).with_stale_lock_after(Duration::ZERO);
        let lock_path = store.lock_path();
        fs::write(&lock_path, "abandoned").unwrap();

        // Run A takes over first
        let winner = store.lock().unwrap();
        let held = fs::read_to_string(&lock_path).unwrap();
        assert_ne!(held, "abandoned");

        // Run B judged the same abandoned lock stale and now tries to take it over
        let result = store.take_over_stale(&lock_path, "abandoned", "run-b");
        assert!(matches!(result, Err(StorageError::Locked(_))));
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), held);
        assert!(!store.sibling(".lock.stale-run-b").exists());

        drop(winner);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_released_lock_spares_another_runs_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        let lock = store.lock().unwrap();
        let lock_path = lock.path().unwrap().clone();

        fs::write(&lock_path, "{\"token\":\"someone-else\"}").unwrap();
        drop(lock);
        assert!(lock_path.exists());
    }

    fn any_ledger() -> impl Strategy<Value = AlertLedger> {
        prop::collection::btree_map(
            "[A-Za-z0-9-]{1,8}".prop_map(|raw| id(&raw)),
            prop_oneof![Just(AlertState::Alerted), Just(AlertState::Resolved)],
            0..16,
        )
    }

    proptest! {
        #[test]
        fn commit_then_load_round_trips(ledger in any_ledger()) {
            let dir = tempfile::tempdir().unwrap();
            let store = JsonFileStore::new(dir.path().join("state.json"));
            store.commit(&ledger).unwrap();
            prop_assert_eq!(store.load().unwrap(), ledger);
        }
    }
}
