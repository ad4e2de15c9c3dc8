//! Notification intents

use crate::engine::{decide, AlertState, Transition};
use crate::message::{alert_message, resolution_message, BilingualMessage};
use row_normalizer::{EntityId, StatusSnapshot};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A notification to send, and the state to persist once it is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub entity: EntityId,
    pub previous: AlertState,
    pub transition: Transition,
    pub new_state: AlertState,
    pub message: BilingualMessage,
}

impl NotificationIntent {
    /// Decide the transition for `snapshot`. `None` means `NoAction`.
    pub fn plan(previous: AlertState, snapshot: &StatusSnapshot) -> Option<Self> {
        let transition = decide(previous, snapshot);
        debug!(
            entity = %snapshot.entity,
            %previous,
            %transition,
            "Planned transition"
        );

        let (new_state, message) = match transition {
            Transition::NoAction => return None,
            Transition::RaiseAlert => (AlertState::Alerted, alert_message(snapshot)),
            Transition::RaiseResolution => (AlertState::Resolved, resolution_message(snapshot)),
        };
        Some(Self {
            entity: snapshot.entity.clone(),
            previous,
            transition,
            new_state,
            message,
        })
    }

    /// Post body handed to the transport
    pub fn text(&self) -> String {
        self.message.combined()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MAX_MESSAGE_CHARS;
    use row_normalizer::{NormalizerConfig, RawRecord, RowNormalizer};
    use serde_json::json;

    fn row(config: NormalizerConfig, alert: &str, resolved: &str) -> StatusSnapshot {
        let record: RawRecord = match json!({
            "Truck ID": "7",
            "Alert": alert,
            "Resolved": resolved,
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        RowNormalizer::new(config).normalize(0, &record).unwrap()
    }

    fn radiation(resolved: &str) -> StatusSnapshot {
        row(NormalizerConfig::default(), "High Radiation Detected", resolved)
    }

    #[test]
    fn test_alert_then_resolve_then_quiet() {
        let intent = NotificationIntent::plan(AlertState::None, &radiation("no")).unwrap();
        assert_eq!(intent.transition, Transition::RaiseAlert);
        assert_eq!(intent.new_state, AlertState::Alerted);
        assert!(intent.text().starts_with("ALERT: Truck 7"));

        let intent = NotificationIntent::plan(AlertState::Alerted, &radiation("yes")).unwrap();
        assert_eq!(intent.transition, Transition::RaiseResolution);
        assert_eq!(intent.new_state, AlertState::Resolved);

        assert!(NotificationIntent::plan(AlertState::Resolved, &radiation("yes")).is_none());
    }

    #[test]
    fn test_configured_keyword_drives_alert_text() {
        let config = NormalizerConfig {
            hazard_keyword: "chemical leak".to_string(),
            ..Default::default()
        };
        let snapshot = row(config, "Chemical leak at depot", "no");

        let intent = NotificationIntent::plan(AlertState::None, &snapshot).unwrap();
        assert_eq!(intent.transition, Transition::RaiseAlert);
        assert!(intent.text().contains("Truck 7 reports Chemical leak at depot."));
        assert!(!intent.text().to_lowercase().contains("radiation"));
    }

    #[test]
    fn test_detailed_row_is_postable() {
        let record: RawRecord = match json!({
            "Truck ID": "CNL-TRK-0042",
            "Alert": "High Radiation Detected",
            "Resolved": "no",
            "Latitude": 46.05123456789012,
            "Longitude": -77.36123456789012,
            "Radiation Level": "Level 3 - 120 uSv/h above background (sensor B)",
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let snapshot = RowNormalizer::default().normalize(0, &record).unwrap();

        let intent = NotificationIntent::plan(AlertState::None, &snapshot).unwrap();
        assert!(intent.text().chars().count() <= MAX_MESSAGE_CHARS);
        assert!(intent.text().contains("CNL-TRK-0042"));
    }
}
