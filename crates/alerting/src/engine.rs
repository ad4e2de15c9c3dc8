//! Transition Engine

use row_normalizer::StatusSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Last announced state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// Never announced
    #[default]
    None,
    /// An alert went out and no resolution has followed
    Alerted,
    /// The last alert episode was closed with a resolution notice
    Resolved,
}

impl AlertState {
    /// Persisted spelling. `None` is never stored: the key is left absent.
    pub fn as_stored(self) -> Option<&'static str> {
        match self {
            AlertState::None => None,
            AlertState::Alerted => Some("alerted"),
            AlertState::Resolved => Some("resolved"),
        }
    }

    /// Parse a persisted value, case-insensitively
    pub fn from_stored(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "alerted" => Some(AlertState::Alerted),
            "resolved" => Some(AlertState::Resolved),
            "none" | "" => Some(AlertState::None),
            _ => None,
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_stored().unwrap_or("none"))
    }
}

/// Outcome of comparing a snapshot against the previous state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    NoAction,
    RaiseAlert,
    RaiseResolution,
}

impl Transition {
    /// State to persist once the notification has been delivered
    pub fn target_state(self) -> Option<AlertState> {
        match self {
            Transition::NoAction => None,
            Transition::RaiseAlert => Some(AlertState::Alerted),
            Transition::RaiseResolution => Some(AlertState::Resolved),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::NoAction => "no_action",
            Transition::RaiseAlert => "raise_alert",
            Transition::RaiseResolution => "raise_resolution",
        };
        f.write_str(name)
    }
}

/// Decide the transition for one entity. First matching rule wins:
///
/// 1. not `Alerted`, hazardous, unresolved: `RaiseAlert`
/// 2. `Alerted`, resolved: `RaiseResolution`
/// 3. otherwise: `NoAction`
///
/// A row both hazardous and resolved never raises an alert, and resolves an
/// open episode.
pub fn decide(previous: AlertState, snapshot: &StatusSnapshot) -> Transition {
    if previous != AlertState::Alerted && snapshot.is_hazardous && !snapshot.is_resolved {
        Transition::RaiseAlert
    } else if previous == AlertState::Alerted && snapshot.is_resolved {
        Transition::RaiseResolution
    } else {
        Transition::NoAction
    }
}
