//! Snapshot Types

use serde::{Deserialize, Serialize};
use std::fmt;

/// One raw record from the data source: column name to arbitrary scalar
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Stable identifier of a tracked vehicle
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Build an identifier from raw text, rejecting blank values
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tri-state reading of the resolved column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Resolved,
    Unresolved,
    /// Text matched neither spelling set; treated as unresolved
    Unrecognized,
}

impl Resolution {
    /// Spellings accepted as resolved
    pub const TRUTHY: [&'static str; 4] = ["yes", "true", "resolved", "1"];
    /// Spellings accepted as unresolved
    pub const FALSY: [&'static str; 6] = ["", "no", "false", "unresolved", "0", "pending"];

    /// Parse with case-insensitive, whitespace-trimmed comparison
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim().to_lowercase();
        if Self::TRUTHY.contains(&value.as_str()) {
            Resolution::Resolved
        } else if Self::FALSY.contains(&value.as_str()) {
            Resolution::Unresolved
        } else {
            Resolution::Unrecognized
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Resolution::Resolved)
    }
}

/// Normalized view of one feed row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub entity: EntityId,
    /// Free text from the alert column, may be empty
    pub alert_text: String,
    /// Alert text contains the hazard keyword
    pub is_hazardous: bool,
    pub resolution: Resolution,
    /// Derived from `resolution`; unrecognized spellings stay unresolved
    pub is_resolved: bool,
    pub latitude: String,
    pub longitude: String,
    pub radiation_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_trims() {
        assert_eq!(EntityId::parse("  7 ").unwrap().as_str(), "7");
        assert!(EntityId::parse("").is_none());
        assert!(EntityId::parse("   \t").is_none());
    }

    #[test]
    fn test_resolution_spellings() {
        for raw in ["yes", "YES", " True ", "Resolved", "1"] {
            assert_eq!(Resolution::parse(raw), Resolution::Resolved, "{raw}");
        }
        for raw in ["no", "No", "FALSE", "0", "", "  "] {
            assert_eq!(Resolution::parse(raw), Resolution::Unresolved, "{raw}");
        }
        assert_eq!(Resolution::parse("maybe"), Resolution::Unrecognized);
        assert!(!Resolution::parse("y e s").is_resolved());
    }
}
