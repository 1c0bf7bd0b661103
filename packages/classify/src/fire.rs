//! Fire-activity detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sfd_feed_models::Incident;

use crate::text::contains_any_keyword;
use crate::within_lookback;

/// Fixed keyword set denoting fire incidents. Matched with word/phrase
/// boundaries against `type` and `description_clean`.
pub const FIRE_KEYWORDS: &[&str] = &[
    "fire",
    "fire in building",
    "brush fire",
    "car fire",
    "marine fire",
];

/// Type codes beginning with this prefix denote fire responses.
pub const FIRE_TYPE_CODE_PREFIX: &str = "fir";

/// Result of a fire-activity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireActivity {
    /// Whether any fire candidate is currently considered active.
    pub is_fire_active: bool,
    /// The active fire candidates.
    pub matching_incidents: Vec<Incident>,
    /// Deterministic justification naming the count and window used.
    pub reasoning: String,
}

/// Whether the incident's text fields mark it as fire-related.
fn is_fire_related(incident: &Incident) -> bool {
    if contains_any_keyword(&incident.incident_type, FIRE_KEYWORDS) {
        return true;
    }
    if let Some(clean) = &incident.description_clean
        && contains_any_keyword(clean, FIRE_KEYWORDS)
    {
        return true;
    }
    incident
        .type_code
        .as_deref()
        .is_some_and(|code| code.to_ascii_lowercase().starts_with(FIRE_TYPE_CODE_PREFIX))
}

/// Whether a fire candidate counts as active: either the upstream flags it
/// active, or it is recent and no responding unit has returned to service.
fn is_still_active(incident: &Incident, now: DateTime<Utc>, lookback_minutes: u32) -> bool {
    if incident.active {
        return true;
    }
    within_lookback(incident, now, lookback_minutes)
        && !incident
            .unit_status
            .values()
            .any(|times| times.in_service.is_some())
}

/// Checks whether any fire incident is currently active.
///
/// Pure reduction over `incidents`: selects fire-related candidates by
/// keyword containment, then keeps those still active per the upstream
/// `active` flag or the recency/in-service heuristic.
#[must_use]
pub fn is_fire_active(
    incidents: &[Incident],
    now: DateTime<Utc>,
    lookback_minutes: u32,
) -> FireActivity {
    let matching_incidents: Vec<Incident> = incidents
        .iter()
        .filter(|incident| is_fire_related(incident))
        .filter(|incident| is_still_active(incident, now, lookback_minutes))
        .cloned()
        .collect();

    log::debug!(
        "fire check: {} active of {} incidents (lookback {lookback_minutes}m)",
        matching_incidents.len(),
        incidents.len(),
    );

    let reasoning = if matching_incidents.is_empty() {
        format!("No active fire incidents within the last {lookback_minutes} minutes.")
    } else {
        format!(
            "Found {} active fire incident(s) within the last {lookback_minutes} minutes.",
            matching_incidents.len(),
        )
    };

    FireActivity {
        is_fire_active: !matching_incidents.is_empty(),
        matching_incidents,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::test_support::{incident, unit_times};

    #[test]
    fn recent_active_brush_fire_is_detected() {
        let now = Utc::now();
        let brush = incident("Brush Fire", now - Duration::minutes(5), true);

        let result = is_fire_active(&[brush], now, 120);
        assert!(result.is_fire_active);
        assert_eq!(result.matching_incidents.len(), 1);
        assert_eq!(result.matching_incidents[0].incident_type, "Brush Fire");
        assert!(result.reasoning.contains("120 minutes"));
    }

    #[test]
    fn water_rescue_never_matches_regardless_of_recency() {
        let now = Utc::now();
        let rescue = incident("Water Rescue", now - Duration::minutes(1), true);

        let result = is_fire_active(&[rescue], now, 120);
        assert!(!result.is_fire_active);
        assert!(result.matching_incidents.is_empty());
    }

    #[test]
    fn fire_inside_unrelated_word_does_not_match() {
        let now = Utc::now();
        let firearm = incident("Firearm Violation", now - Duration::minutes(1), true);

        assert!(!is_fire_active(&[firearm], now, 120).is_fire_active);
    }

    #[test]
    fn fire_type_code_prefix_matches() {
        let now = Utc::now();
        let mut coded = incident("Response", now - Duration::minutes(5), true);
        coded.type_code = Some("FIR0021".to_string());

        assert!(is_fire_active(&[coded], now, 120).is_fire_active);
    }

    #[test]
    fn inactive_flag_with_recent_time_and_no_in_service_counts_as_active() {
        let now = Utc::now();
        let mut fire = incident("Car Fire", now - Duration::minutes(10), false);
        fire.unit_status.insert("E16".to_string(), unit_times(None));

        assert!(is_fire_active(&[fire], now, 120).is_fire_active);
    }

    #[test]
    fn unit_back_in_service_marks_inactive_candidate_done() {
        let now = Utc::now();
        let mut fire = incident("Car Fire", now - Duration::minutes(10), false);
        fire.unit_status
            .insert("E16".to_string(), unit_times(Some("14:55")));

        assert!(!is_fire_active(&[fire], now, 120).is_fire_active);
    }

    #[test]
    fn stale_inactive_fire_is_not_active() {
        let now = Utc::now();
        let fire = incident("Fire In Building", now - Duration::minutes(500), false);

        let result = is_fire_active(&[fire], now, 120);
        assert!(!result.is_fire_active);
        assert!(result.reasoning.contains("No active fire"));
    }
}
