//! Evacuation-order detection.
//!
//! Scans recent incident text for evacuation keywords. The feed carries live
//! dispatch chatter, not official emergency-management declarations — the
//! result's `notes` field always says so.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sfd_feed_models::Incident;

use crate::text::contains_any_keyword;
use crate::within_lookback;

/// Fixed keyword list denoting evacuation activity.
pub const EVACUATION_KEYWORDS: &[&str] = &[
    "evacuation",
    "evacuate",
    "evacuation order",
    "evacuation advisory",
    "evacuations in progress",
];

/// Result of an evacuation-order check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvacuationOrders {
    /// Whether any recent incident mentions evacuation.
    pub has_evacuation_orders: bool,
    /// The incidents whose text matched.
    pub supporting_incidents: Vec<Incident>,
    /// Caveat about the feed's authority, plus count and window.
    pub notes: String,
}

fn mentions_evacuation(incident: &Incident) -> bool {
    [
        Some(incident.incident_type.as_str()),
        incident.description.as_deref(),
        incident.description_clean.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|text| contains_any_keyword(text, EVACUATION_KEYWORDS))
}

/// Checks recent incidents for evacuation-related keywords.
///
/// Pure reduction: filters to the lookback window by `datetime_utc`, then
/// matches the keyword list over the free-text fields.
#[must_use]
pub fn has_evacuation_orders(
    incidents: &[Incident],
    now: DateTime<Utc>,
    lookback_minutes: u32,
) -> EvacuationOrders {
    let supporting_incidents: Vec<Incident> = incidents
        .iter()
        .filter(|incident| within_lookback(incident, now, lookback_minutes))
        .filter(|incident| mentions_evacuation(incident))
        .cloned()
        .collect();

    log::debug!(
        "evacuation check: {} of {} incidents matched (lookback {lookback_minutes}m)",
        supporting_incidents.len(),
        incidents.len(),
    );

    let notes = if supporting_incidents.is_empty() {
        format!(
            "No evacuation-related keywords found in incidents from the last \
             {lookback_minutes} minutes. Official evacuation orders come from \
             emergency-management channels, not this live incident feed."
        )
    } else {
        format!(
            "Found {} incident(s) with evacuation-related keywords in the last \
             {lookback_minutes} minutes. This reflects live incident chatter only; \
             authoritative evacuation orders come from emergency-management \
             channels outside this feed.",
            supporting_incidents.len(),
        )
    };

    EvacuationOrders {
        has_evacuation_orders: !supporting_incidents.is_empty(),
        supporting_incidents,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::test_support::incident;

    #[test]
    fn evacuation_order_inside_window_is_detected() {
        let now = Utc::now();
        let mut inc = incident("Rescue", now - Duration::minutes(30), true);
        inc.description = Some("Evacuation order issued for block".to_string());

        let result = has_evacuation_orders(&[inc], now, 180);
        assert!(result.has_evacuation_orders);
        assert_eq!(result.supporting_incidents.len(), 1);
        assert!(result.notes.contains("180 minutes"));
    }

    #[test]
    fn same_text_outside_window_is_ignored() {
        let now = Utc::now();
        let mut inc = incident("Rescue", now - Duration::minutes(300), true);
        inc.description = Some("Evacuation order issued for block".to_string());

        let result = has_evacuation_orders(&[inc], now, 180);
        assert!(!result.has_evacuation_orders);
        assert!(result.supporting_incidents.is_empty());
    }

    #[test]
    fn clean_description_is_also_scanned() {
        let now = Utc::now();
        let mut inc = incident("Fire In Building", now - Duration::minutes(10), true);
        inc.description_clean = Some("crews evacuating residents, evacuations in progress".to_string());

        assert!(has_evacuation_orders(&[inc], now, 180).has_evacuation_orders);
    }

    #[test]
    fn notes_always_mention_the_feed_is_not_authoritative() {
        let now = Utc::now();
        let result = has_evacuation_orders(&[], now, 180);
        assert!(!result.has_evacuation_orders);
        assert!(result.notes.contains("emergency-management"));
    }
}
