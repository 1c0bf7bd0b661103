#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Semantic classification over normalized feed incidents.
//!
//! Two pure reductions: [`fire::is_fire_active`] and
//! [`evacuation::has_evacuation_orders`]. Both take an already-normalized
//! incident list, a lookback window, and an explicit `now` — they never
//! fetch, cache, or mutate anything, which keeps them trivially testable.

pub mod evacuation;
pub mod fire;
mod text;

pub use evacuation::{EvacuationOrders, has_evacuation_orders};
pub use fire::{FireActivity, is_fire_active};

use chrono::{DateTime, Utc};
use sfd_feed_models::Incident;

/// Whether the incident's `datetime_utc` falls within `lookback_minutes`
/// of `now`. Future-dated incidents (clock skew upstream) count as within
/// the window.
#[must_use]
pub fn within_lookback(incident: &Incident, now: DateTime<Utc>, lookback_minutes: u32) -> bool {
    now - incident.datetime_utc <= chrono::Duration::minutes(i64::from(lookback_minutes))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};
    use sfd_feed_models::{Incident, UnitTimes};

    /// Builds a minimal incident for classifier tests.
    pub fn incident(incident_type: &str, datetime_utc: DateTime<Utc>, active: bool) -> Incident {
        Incident {
            id: 1,
            incident_number: "F250010001".to_string(),
            incident_type: incident_type.to_string(),
            type_code: None,
            description: None,
            description_clean: None,
            address: None,
            area: None,
            battalion: None,
            datetime_local: datetime_utc.fixed_offset(),
            datetime_utc,
            latitude: None,
            longitude: None,
            units: Vec::new(),
            primary_unit: None,
            unit_status: BTreeMap::new(),
            active,
            late: false,
            alarm: 1,
            raw: serde_json::Map::new(),
        }
    }

    /// Unit status entry with the given `in_service` timestamp.
    pub fn unit_times(in_service: Option<&str>) -> UnitTimes {
        UnitTimes {
            dispatched: Some("14:31".to_string()),
            arrived: None,
            transport: None,
            in_service: in_service.map(str::to_string),
        }
    }
}
