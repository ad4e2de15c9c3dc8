//! Bilingual notification text
//!
//! Both locales go out in one post, so every notice is fitted to
//! [`MAX_MESSAGE_CHARS`] before it leaves this module. Free-form sheet values
//! are coarsened or shortened first; the truck and the hazard always stay.

use crate::engine::Transition;
use row_normalizer::StatusSnapshot;
use serde::{Deserialize, Serialize};

/// Longest combined post, both locales and the separator included
pub const MAX_MESSAGE_CHARS: usize = 300;

const ELLIPSIS: char = '…';

/// Supported notification locales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    English,
    French,
}

/// The same notice in both locales
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualMessage {
    pub english: String,
    pub french: String,
}

impl BilingualMessage {
    pub fn text(&self, locale: Locale) -> &str {
        match locale {
            Locale::English => &self.english,
            Locale::French => &self.french,
        }
    }

    /// Single post body: English, blank line, French
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.english, self.french)
    }

    fn fits(&self) -> bool {
        // "\n\n" separator
        self.english.chars().count() + self.french.chars().count() + 2 <= MAX_MESSAGE_CHARS
    }
}

/// Render the notice for a transition. `NoAction` has nothing to say.
pub fn render(transition: Transition, snapshot: &StatusSnapshot) -> Option<BilingualMessage> {
    match transition {
        Transition::NoAction => None,
        Transition::RaiseAlert => Some(alert_message(snapshot)),
        Transition::RaiseResolution => Some(resolution_message(snapshot)),
    }
}

/// Alert notice quoting the row's own alert text
pub(crate) fn alert_message(snapshot: &StatusSnapshot) -> BilingualMessage {
    let mut parts = AlertParts::new(snapshot);
    let mut message = parts.message();
    let mut step = 0;
    while !message.fits() && parts.shrink(step) {
        step += 1;
        message = parts.message();
    }
    message
}

pub(crate) fn resolution_message(snapshot: &StatusSnapshot) -> BilingualMessage {
    let build = |truck: &str| BilingualMessage {
        english: format!("RESOLVED: The alert for truck {truck} has been resolved."),
        french: format!("RÉSOLU : L'alerte pour le camion {truck} est levée."),
    };

    let message = build(snapshot.entity.as_str());
    if message.fits() {
        return message;
    }
    let mut truck = snapshot.entity.as_str().to_string();
    shorten(&mut truck, 64);
    build(&truck)
}

/// Pieces of an alert notice that may be shortened to fit
struct AlertParts {
    truck: String,
    hazard: String,
    level: String,
    location: Option<(String, String)>,
}

impl AlertParts {
    fn new(snapshot: &StatusSnapshot) -> Self {
        let location = if snapshot.latitude.is_empty() || snapshot.longitude.is_empty() {
            None
        } else {
            Some((snapshot.latitude.clone(), snapshot.longitude.clone()))
        };
        Self {
            truck: snapshot.entity.as_str().to_string(),
            hazard: snapshot.alert_text.trim().to_string(),
            level: snapshot.radiation_level.clone(),
            location,
        }
    }

    fn message(&self) -> BilingualMessage {
        let truck = &self.truck;
        let hazard = &self.hazard;
        let level = if self.level.is_empty() {
            String::new()
        } else {
            format!(" ({})", self.level)
        };
        let (at_en, at_fr) = match &self.location {
            Some((lat, lon)) => (format!(" at {lat}, {lon}"), format!(" à {lat}, {lon}")),
            None => (String::new(), String::new()),
        };
        BilingualMessage {
            english: format!("ALERT: Truck {truck} reports {hazard}{level}{at_en}. Keep clear."),
            french: format!(
                "ALERTE : Le camion {truck} signale : {hazard}{level}{at_fr}. Restez à l'écart."
            ),
        }
    }

    /// Apply the `step`th reduction. Returns false once nothing is left to cut.
    fn shrink(&mut self, step: usize) -> bool {
        match step {
            0 => self.coarsen_location(),
            1 => shorten(&mut self.level, 24),
            2 => shorten(&mut self.hazard, 48),
            3 => self.location = None,
            4 => self.level.clear(),
            5 => shorten(&mut self.hazard, 20),
            6 => shorten(&mut self.truck, 24),
            _ => return false,
        }
        true
    }

    /// Three decimals is roughly 100 m
    fn coarsen_location(&mut self) {
        if let Some((lat, lon)) = self.location.as_mut() {
            for coordinate in [lat, lon] {
                match coordinate.trim().parse::<f64>() {
                    Ok(value) if value.is_finite() => *coordinate = format!("{value:.3}"),
                    _ => shorten(coordinate, 12),
                }
            }
        }
    }
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis
fn shorten(text: &mut String, max: usize) {
    if text.chars().count() <= max {
        return;
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push(ELLIPSIS);
    *text = cut;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use row_normalizer::{EntityId, Resolution};

    fn snapshot(latitude: &str, longitude: &str, level: &str) -> StatusSnapshot {
        StatusSnapshot {
            entity: EntityId::parse("7").unwrap(),
            alert_text: "High Radiation Detected".to_string(),
            is_hazardous: true,
            resolution: Resolution::Unresolved,
            is_resolved: false,
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
            radiation_level: level.to_string(),
        }
    }

    fn length(message: &BilingualMessage) -> usize {
        message.combined().chars().count()
    }

    #[test]
    fn test_alert_includes_location_and_level() {
        let message =
            render(Transition::RaiseAlert, &snapshot("44.05", "-77.36", "12 mSv")).unwrap();
        assert!(message.english.contains("Truck 7 reports High Radiation Detected"));
        assert!(message.english.contains("(12 mSv) at 44.05, -77.36"));
        assert!(message.french.contains("camion 7"));
        assert!(message.french.contains("à 44.05, -77.36"));
    }

    #[test]
    fn test_alert_omits_missing_fields() {
        let message = render(Transition::RaiseAlert, &snapshot("44.05", "", "")).unwrap();
        assert_eq!(
            message.english,
            "ALERT: Truck 7 reports High Radiation Detected. Keep clear."
        );
        assert!(!message.french.contains("44.05"));
    }

    #[test]
    fn test_alert_quotes_row_hazard() {
        let mut row = snapshot("", "", "");
        row.alert_text = "Chemical leak at depot".to_string();
        let message = render(Transition::RaiseAlert, &row).unwrap();
        assert!(message.english.contains("reports Chemical leak at depot."));
        assert!(message.french.contains("signale : Chemical leak at depot."));
        assert!(!message.combined().to_lowercase().contains("radiation"));
    }

    #[test]
    fn test_detailed_row_fits_by_coarsening_coordinates() {
        let mut row = snapshot(
            "46.05123456789012",
            "-77.36123456789012",
            "Level 3 - 120 uSv/h above background (sensor B)",
        );
        row.entity = EntityId::parse("CNL-TRK-0042").unwrap();

        let message = render(Transition::RaiseAlert, &row).unwrap();
        assert!(length(&message) <= MAX_MESSAGE_CHARS);
        assert!(message.english.contains("Truck CNL-TRK-0042"));
        assert!(message.english.contains("(Level 3 - 120 uSv/h above background (sensor B))"));
        assert!(message.english.contains("at 46.051, -77.361"));
    }

    #[test]
    fn test_oversized_fields_are_shortened_not_dropped() {
        let mut row = snapshot("north depot gate", "east lot", &"9".repeat(200));
        row.alert_text = format!("High radiation {}", "x".repeat(200));

        let message = render(Transition::RaiseAlert, &row).unwrap();
        assert!(length(&message) <= MAX_MESSAGE_CHARS);
        assert!(message.english.starts_with("ALERT: Truck 7 reports High radiation"));
        assert!(message.english.contains(ELLIPSIS));
    }

    #[test]
    fn test_resolution_and_no_action() {
        let row = snapshot("", "", "");
        let message = render(Transition::RaiseResolution, &row).unwrap();
        assert_eq!(
            message.text(Locale::English),
            "RESOLVED: The alert for truck 7 has been resolved."
        );
        assert!(message.combined().contains("\n\nRÉSOLU"));
        assert!(render(Transition::NoAction, &row).is_none());
    }

    #[test]
    fn test_shorten_marks_cut() {
        let mut text = "abcdef".to_string();
        shorten(&mut text, 4);
        assert_eq!(text, "abc…");

        let mut short = "abc".to_string();
        shorten(&mut short, 4);
        assert_eq!(short, "abc");
    }

    proptest! {
        #[test]
        fn every_notice_fits_one_post(
            truck in "[A-Za-z0-9-]{1,120}",
            hazard in "\\PC{1,200}",
            level in "\\PC{0,200}",
            latitude in "\\PC{0,60}",
            longitude in "\\PC{0,60}",
        ) {
            let mut row = snapshot(&latitude, &longitude, &level);
            row.entity = EntityId::parse(&truck).unwrap();
            row.alert_text = hazard;

            for transition in [Transition::RaiseAlert, Transition::RaiseResolution] {
                let message = render(transition, &row).unwrap();
                prop_assert!(length(&message) <= MAX_MESSAGE_CHARS);
            }
        }
    }
}
