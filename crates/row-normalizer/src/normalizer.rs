//! Row Normalizer

use crate::error::RowError;
use crate::snapshot::{EntityId, RawRecord, Resolution, StatusSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Hazard keyword matched against the alert column
pub const DEFAULT_HAZARD_KEYWORD: &str = "high radiation";

/// Sheet column names for each snapshot field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub entity: String,
    pub alert: String,
    pub resolved: String,
    pub latitude: String,
    pub longitude: String,
    pub radiation_level: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            entity: "Truck ID".to_string(),
            alert: "Alert".to_string(),
            resolved: "Resolved".to_string(),
            latitude: "Latitude".to_string(),
            longitude: "Longitude".to_string(),
            radiation_level: "Radiation Level".to_string(),
        }
    }
}

/// Normalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Case-insensitive substring marking a row as hazardous
    pub hazard_keyword: String,
    pub columns: ColumnMapping,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            hazard_keyword: DEFAULT_HAZARD_KEYWORD.to_string(),
            columns: ColumnMapping::default(),
        }
    }
}

/// Converts raw records into snapshots
pub struct RowNormalizer {
    keyword: String,
    columns: ColumnMapping,
}

impl RowNormalizer {
    /// Create a new normalizer
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            keyword: config.hazard_keyword.trim().to_lowercase(),
            columns: config.columns,
        }
    }

    /// Normalize one record. `row` is only used for error reporting.
    pub fn normalize(&self, row: usize, record: &RawRecord) -> Result<StatusSnapshot, RowError> {
        let entity = EntityId::parse(&self.field(record, &self.columns.entity)).ok_or_else(|| {
            RowError::MissingEntity {
                row,
                column: self.columns.entity.clone(),
            }
        })?;

        let alert_text = self.field(record, &self.columns.alert).trim().to_string();
        let is_hazardous =
            !self.keyword.is_empty() && alert_text.to_lowercase().contains(&self.keyword);

        let raw_resolved = self.field(record, &self.columns.resolved);
        let resolution = Resolution::parse(&raw_resolved);
        if resolution == Resolution::Unrecognized {
            warn!(
                entity = %entity,
                value = %raw_resolved,
                "Unrecognized resolved value, treating as unresolved"
            );
        }

        Ok(StatusSnapshot {
            entity,
            alert_text,
            is_hazardous,
            resolution,
            is_resolved: resolution.is_resolved(),
            latitude: self.field(record, &self.columns.latitude).trim().to_string(),
            longitude: self.field(record, &self.columns.longitude).trim().to_string(),
            radiation_level: self
                .field(record, &self.columns.radiation_level)
                .trim()
                .to_string(),
        })
    }

    /// Normalize a whole feed, keeping the first row seen for each entity
    pub fn normalize_feed(&self, records: &[RawRecord]) -> (Vec<StatusSnapshot>, Vec<RowError>) {
        let mut snapshots = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        let mut first_seen: HashMap<EntityId, usize> = HashMap::new();

        for (row, record) in records.iter().enumerate() {
            match self.normalize(row, record) {
                Ok(snapshot) => {
                    if let Some(&first_row) = first_seen.get(&snapshot.entity) {
                        rejected.push(RowError::DuplicateEntity {
                            row,
                            entity: snapshot.entity.to_string(),
                            first_row,
                        });
                        continue;
                    }
                    first_seen.insert(snapshot.entity.clone(), row);
                    snapshots.push(snapshot);
                }
                Err(e) => rejected.push(e),
            }
        }

        debug!(
            "Normalized {} rows: {} snapshots, {} rejected",
            records.len(),
            snapshots.len(),
            rejected.len()
        );
        (snapshots, rejected)
    }

    /// Look up a column by trimmed, case-insensitive name. Absent is empty.
    fn field(&self, record: &RawRecord, column: &str) -> String {
        let wanted = column.trim();
        record
            .get(wanted)
            .or_else(|| {
                record
                    .iter()
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case(wanted))
                    .map(|(_, value)| value)
            })
            .map(scalar_text)
            .unwrap_or_default()
    }
}

impl Default for RowNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

/// Render a sheet scalar as display text
fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                // Sheets hand back whole numbers as floats ("7.0" for truck 7)
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                        format!("{:.0}", f)
                    }
                    _ => n.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_hazardous_unresolved_row() {
        let normalizer = RowNormalizer::default();
        let snapshot = normalizer
            .normalize(
                0,
                &record(json!({
                    "Truck ID": 7,
                    "Alert": "High Radiation Detected",
                    "Resolved": "no",
                    "Latitude": 44.05,
                    "Longitude": -77.36,
                    "Radiation Level": "12 mSv"
                })),
            )
            .unwrap();

        assert_eq!(snapshot.entity.as_str(), "7");
        assert!(snapshot.is_hazardous);
        assert!(!snapshot.is_resolved);
        assert_eq!(snapshot.latitude, "44.05");
        assert_eq!(snapshot.radiation_level, "12 mSv");
    }

    #[test]
    fn test_missing_optional_columns() {
        let normalizer = RowNormalizer::default();
        let snapshot = normalizer
            .normalize(3, &record(json!({ "Truck ID": "A-12" })))
            .unwrap();

        assert_eq!(snapshot.alert_text, "");
        assert!(!snapshot.is_hazardous);
        assert!(!snapshot.is_resolved);
        assert_eq!(snapshot.longitude, "");
    }

    #[test]
    fn test_blank_entity_is_invalid() {
        let normalizer = RowNormalizer::default();
        let err = normalizer
            .normalize(4, &record(json!({ "Truck ID": "   ", "Alert": "high radiation" })))
            .unwrap_err();
        assert_eq!(err.row(), 4);
        assert!(matches!(err, RowError::MissingEntity { .. }));

        assert!(normalizer.normalize(5, &record(json!({ "Alert": "x" }))).is_err());
    }

    #[test]
    fn test_column_names_are_case_insensitive() {
        let normalizer = RowNormalizer::default();
        let snapshot = normalizer
            .normalize(
                0,
                &record(json!({ " truck id ": 9.0, "ALERT": "HIGH RADIATION", "resolved": "Yes" })),
            )
            .unwrap();

        assert_eq!(snapshot.entity.as_str(), "9");
        assert!(snapshot.is_hazardous);
        assert!(snapshot.is_resolved);
    }

    #[test]
    fn test_custom_keyword() {
        let normalizer = RowNormalizer::new(NormalizerConfig {
            hazard_keyword: "  Chemical Leak ".to_string(),
            ..Default::default()
        });
        let snapshot = normalizer
            .normalize(0, &record(json!({ "Truck ID": "1", "Alert": "chemical leak near depot" })))
            .unwrap();
        assert!(snapshot.is_hazardous);
    }

    #[test]
    fn test_duplicate_entities_keep_first() {
        let normalizer = RowNormalizer::default();
        let rows = vec![
            record(json!({ "Truck ID": "7", "Alert": "High Radiation" })),
            record(json!({ "Truck ID": "" })),
            record(json!({ "Truck ID": " 7", "Alert": "" })),
        ];

        let (snapshots, rejected) = normalizer.normalize_feed(&rows);
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].is_hazardous);
        assert_eq!(rejected.len(), 2);
        assert_eq!(
            rejected[1],
            RowError::DuplicateEntity {
                row: 2,
                entity: "7".to_string(),
                first_row: 0
            }
        );
    }

    proptest! {
        #[test]
        fn unknown_spellings_never_resolve(raw in "[a-z ]{0,12}") {
            let normalized = raw.trim().to_lowercase();
            prop_assume!(!Resolution::TRUTHY.contains(&normalized.as_str()));
            let normalizer = RowNormalizer::default();
            let snapshot = normalizer
                .normalize(0, &record(json!({ "Truck ID": "1", "Resolved": raw })))
                .unwrap();
            prop_assert!(!snapshot.is_resolved);
        }

        #[test]
        fn keyword_match_ignores_case(prefix in "[a-z ]{0,8}", upper in any::<bool>()) {
            let text = if upper {
                format!("{prefix}HIGH RADIATION")
            } else {
                format!("{prefix}High Radiation")
            };
            let normalizer = RowNormalizer::default();
            let snapshot = normalizer
                .normalize(0, &record(json!({ "Truck ID": "1", "Alert": text })))
                .unwrap();
            prop_assert!(snapshot.is_hazardous);
        }
    }
}
