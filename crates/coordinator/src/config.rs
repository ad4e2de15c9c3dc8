//! Run policies

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when the stored ledger cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptStorePolicy {
    /// Fail the run and leave the file alone
    #[default]
    Abort,
    /// Move the file aside and start from an empty ledger
    Reset,
}

/// What to do with stored entities that are missing from the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentEntityPolicy {
    /// Keep their last state indefinitely
    #[default]
    Retain,
    /// Drop them at commit; a reappearing hazard alerts again
    Prune,
}

/// Run coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub corrupt_store_policy: CorruptStorePolicy,
    pub absent_entity_policy: AbsentEntityPolicy,
    /// Upper bound on one feed fetch (seconds)
    pub fetch_timeout_secs: u64,
    /// Upper bound on one notification send (seconds)
    pub send_timeout_secs: u64,
    /// Commit the ledger at the end of the run. Off for dry runs.
    pub commit: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            corrupt_store_policy: CorruptStorePolicy::Abort,
            absent_entity_policy: AbsentEntityPolicy::Retain,
            fetch_timeout_secs: 30,
            send_timeout_secs: 15,
            commit: true,
        }
    }
}

impl RunConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}
