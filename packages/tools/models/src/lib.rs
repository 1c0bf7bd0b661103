#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input/output types for each feed tool, along with JSON Schema
//! descriptions for the tool-calling protocol.
//!
//! Tool inputs use camelCase field names matching the wire contract
//! (`lookbackMinutes`, `cacheTtlSeconds`); out-of-range lookback values are
//! clamped to their documented bounds rather than rejected.

use serde::{Deserialize, Serialize};
use sfd_feed_models::{Incident, QueryParams, ResponseMeta, ResponseSource};

/// Lookback bounds and default for `is_fire_active`, in minutes.
pub const FIRE_LOOKBACK_MIN: u32 = 15;
/// Upper bound for the fire lookback window.
pub const FIRE_LOOKBACK_MAX: u32 = 360;
/// Default fire lookback window.
pub const FIRE_LOOKBACK_DEFAULT: u32 = 120;

/// Lookback bounds and default for `has_evacuation_orders`, in minutes.
pub const EVACUATION_LOOKBACK_MIN: u32 = 30;
/// Upper bound for the evacuation lookback window.
pub const EVACUATION_LOOKBACK_MAX: u32 = 720;
/// Default evacuation lookback window.
pub const EVACUATION_LOOKBACK_DEFAULT: u32 = 180;

/// Input for the `fetch_raw` tool: the upstream filter fields plus a cache
/// TTL. A TTL of zero bypasses the cache entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchRawInput {
    /// Upstream filter fields (all optional, documented defaults apply).
    #[serde(flatten)]
    pub params: QueryParams,
    /// Cache TTL in seconds; `None` means the process default.
    pub cache_ttl_seconds: Option<u64>,
}

/// Output of `fetch_raw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRawResponse {
    /// Upstream envelope metadata.
    pub meta: ResponseMeta,
    /// Normalized incidents.
    pub incidents: Vec<Incident>,
    /// Fetch provenance.
    pub source: ResponseSource,
}

/// Output of `latest_incident`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestIncidentResponse {
    /// The incident with the maximum `datetime_utc` in the latest page.
    pub incident: Incident,
    /// Fetch provenance.
    pub source: ResponseSource,
}

/// Input for `active_incidents`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveIncidentsInput {
    /// Cache TTL in seconds; `None` means the process default, `0` bypasses
    /// the cache.
    pub cache_ttl_seconds: Option<u64>,
}

/// Lightweight view of one active incident, trimmed for snapshot responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveIncidentSummary {
    /// Upstream row identifier.
    pub id: i64,
    /// Upstream incident number.
    pub incident_number: String,
    /// Incident type label.
    #[serde(rename = "type")]
    pub incident_type: String,
    /// Cleaned description when available, raw otherwise.
    pub description: Option<String>,
    /// Local wall-clock time, e.g. `"6:55 PM"`.
    pub time: String,
    /// Dispatch address.
    pub address: Option<String>,
    /// Dispatch area.
    pub area: Option<String>,
    /// Responding unit tokens.
    pub units: Vec<String>,
}

impl From<&Incident> for ActiveIncidentSummary {
    fn from(incident: &Incident) -> Self {
        Self {
            id: incident.id,
            incident_number: incident.incident_number.clone(),
            incident_type: incident.incident_type.clone(),
            description: incident
                .description_clean
                .clone()
                .or_else(|| incident.description.clone()),
            time: incident.datetime_local.format("%-I:%M %p").to_string(),
            address: incident.address.clone(),
            area: incident.area.clone(),
            units: incident.units.clone(),
        }
    }
}

/// Output of `active_incidents`: a focused snapshot of ongoing incidents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveIncidentsResponse {
    /// Number of active incidents.
    pub count: usize,
    /// Lightweight summaries, newest first as the upstream returned them.
    pub incidents: Vec<ActiveIncidentSummary>,
    /// Fetch provenance.
    pub source: ResponseSource,
}

/// Input for `is_fire_active`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IsFireActiveInput {
    /// Trailing window in minutes; clamped to `[15, 360]`.
    pub lookback_minutes: u32,
}

impl Default for IsFireActiveInput {
    fn default() -> Self {
        Self {
            lookback_minutes: FIRE_LOOKBACK_DEFAULT,
        }
    }
}

impl IsFireActiveInput {
    /// The lookback window clamped to its documented bounds.
    #[must_use]
    pub const fn clamped_lookback(&self) -> u32 {
        clamp_u32(self.lookback_minutes, FIRE_LOOKBACK_MIN, FIRE_LOOKBACK_MAX)
    }
}

/// Input for `has_evacuation_orders`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HasEvacuationOrdersInput {
    /// Trailing window in minutes; clamped to `[30, 720]`.
    pub lookback_minutes: u32,
}

impl Default for HasEvacuationOrdersInput {
    fn default() -> Self {
        Self {
            lookback_minutes: EVACUATION_LOOKBACK_DEFAULT,
        }
    }
}

impl HasEvacuationOrdersInput {
    /// The lookback window clamped to its documented bounds.
    #[must_use]
    pub const fn clamped_lookback(&self) -> u32 {
        clamp_u32(
            self.lookback_minutes,
            EVACUATION_LOOKBACK_MIN,
            EVACUATION_LOOKBACK_MAX,
        )
    }
}

const fn clamp_u32(value: u32, min: u32, max: u32) -> u32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Enumeration of all tool names the boundary can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Low-level normalized fetch of the upstream feed.
    FetchRaw,
    /// Snapshot of currently active incidents.
    ActiveIncidents,
    /// The single most recent incident.
    LatestIncident,
    /// Whether a fire incident is currently active.
    IsFireActive,
    /// Whether recent incidents mention evacuation orders.
    HasEvacuationOrders,
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FetchRaw => write!(f, "fetch_raw"),
            Self::ActiveIncidents => write!(f, "active_incidents"),
            Self::LatestIncident => write!(f, "latest_incident"),
            Self::IsFireActive => write!(f, "is_fire_active"),
            Self::HasEvacuationOrders => write!(f, "has_evacuation_orders"),
        }
    }
}

/// Returns the JSON Schema definitions for all available tools.
///
/// These are used by the tool-calling protocol to describe what a calling
/// agent can invoke.
#[must_use]
pub fn tool_definitions() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "name": "fetch_raw",
            "description": "Fetch and normalize incidents from the Seattle Fire Department live feed with optional filters and caching. Use this for low-level access to incident data.",
            "parameters": {
                "type": "object",
                "properties": {
                    "order": { "type": "string", "enum": ["new", "old"], "description": "Sort order (default new)" },
                    "start": { "type": "integer", "description": "Row offset (default 0)" },
                    "length": { "type": "integer", "description": "Rows per page, 1-500 (default 100)" },
                    "search": { "type": "string", "description": "Free-text search filter (default Any)" },
                    "page": { "type": "integer", "description": "Page number (default 1)" },
                    "location": { "type": "string", "description": "Address filter (default Any)" },
                    "unit": { "type": "string", "description": "Responding unit filter (default Any)" },
                    "type": { "type": "string", "description": "Incident type filter (default Any)" },
                    "area": { "type": "string", "description": "Dispatch area filter (default Any)" },
                    "date": { "type": "string", "description": "Start date, 'Today' or YYYY-MM-DD (default Today)" },
                    "dateEnd": { "type": "string", "description": "End date (default Today)" },
                    "cacheTtlSeconds": { "type": "integer", "description": "Cache TTL in seconds; 0 bypasses the cache (default 15)" }
                },
                "required": []
            }
        }),
        serde_json::json!({
            "name": "active_incidents",
            "description": "Snapshot of currently active Seattle Fire Department incidents as lightweight summaries, filtered to incidents the upstream marks active.",
            "parameters": {
                "type": "object",
                "properties": {
                    "cacheTtlSeconds": { "type": "integer", "description": "Cache TTL in seconds; 0 bypasses the cache (default 15)" }
                },
                "required": []
            }
        }),
        serde_json::json!({
            "name": "latest_incident",
            "description": "Return the single most recent incident from the live feed, selected by timestamp rather than upstream ordering.",
            "parameters": {
                "type": "object",
                "properties": {},
                "required": []
            }
        }),
        serde_json::json!({
            "name": "is_fire_active",
            "description": "Check whether any fire incident is currently active in Seattle, with the matching incidents and a short justification.",
            "parameters": {
                "type": "object",
                "properties": {
                    "lookbackMinutes": { "type": "integer", "description": "Trailing window in minutes, 15-360 (default 120)" }
                },
                "required": []
            }
        }),
        serde_json::json!({
            "name": "has_evacuation_orders",
            "description": "Check whether recent incident chatter mentions evacuation orders. Not authoritative: official orders come from emergency-management channels.",
            "parameters": {
                "type": "object",
                "properties": {
                    "lookbackMinutes": { "type": "integer", "description": "Trailing window in minutes, 30-720 (default 180)" }
                },
                "required": []
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_serialize_as_snake_case() {
        assert_eq!(ToolName::FetchRaw.to_string(), "fetch_raw");
        assert_eq!(
            serde_json::to_value(ToolName::HasEvacuationOrders).unwrap(),
            serde_json::json!("has_evacuation_orders")
        );
    }

    #[test]
    fn definitions_cover_every_tool() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "fetch_raw",
                "active_incidents",
                "latest_incident",
                "is_fire_active",
                "has_evacuation_orders"
            ]
        );
    }

    #[test]
    fn lookback_defaults_and_clamping() {
        assert_eq!(IsFireActiveInput::default().lookback_minutes, 120);
        assert_eq!(
            IsFireActiveInput { lookback_minutes: 5 }.clamped_lookback(),
            15
        );
        assert_eq!(
            IsFireActiveInput {
                lookback_minutes: 1000
            }
            .clamped_lookback(),
            360
        );

        assert_eq!(HasEvacuationOrdersInput::default().lookback_minutes, 180);
        assert_eq!(
            HasEvacuationOrdersInput { lookback_minutes: 10 }.clamped_lookback(),
            30
        );
    }

    #[test]
    fn active_summary_prefers_clean_description_and_formats_local_time() {
        use chrono::TimeZone as _;

        let local = chrono::FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 7, 15, 18, 55, 0)
            .unwrap();
        let incident = Incident {
            id: 42,
            incident_number: "F250012345".to_string(),
            incident_type: "Brush Fire".to_string(),
            type_code: None,
            description: Some("BRUSH FIRE RAW".to_string()),
            description_clean: Some("Brush fire".to_string()),
            address: Some("1234 5th Ave".to_string()),
            area: None,
            battalion: None,
            datetime_local: local,
            datetime_utc: local.with_timezone(&chrono::Utc),
            latitude: None,
            longitude: None,
            units: vec!["E16".to_string()],
            primary_unit: Some("E16".to_string()),
            unit_status: std::collections::BTreeMap::new(),
            active: true,
            late: false,
            alarm: 1,
            raw: serde_json::Map::new(),
        };

        let summary = ActiveIncidentSummary::from(&incident);
        assert_eq!(summary.time, "6:55 PM");
        assert_eq!(summary.description.as_deref(), Some("Brush fire"));
        assert_eq!(summary.units, vec!["E16"]);

        let mut no_clean = incident;
        no_clean.description_clean = None;
        let summary = ActiveIncidentSummary::from(&no_clean);
        assert_eq!(summary.description.as_deref(), Some("BRUSH FIRE RAW"));
    }

    #[test]
    fn fetch_raw_input_parses_camel_case_fields() {
        let input: FetchRawInput =
            serde_json::from_str(r#"{"length": 10, "cacheTtlSeconds": 0}"#).unwrap();
        assert_eq!(input.params.length, 10);
        assert_eq!(input.cache_ttl_seconds, Some(0));
    }
}
