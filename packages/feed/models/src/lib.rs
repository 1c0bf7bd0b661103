#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query parameter types and the canonical incident format for the Seattle
//! Fire Department live incident feed.
//!
//! The upstream feed is loosely typed (index-keyed wrapper objects,
//! object-or-scalar coordinates, numeric booleans, decorated unit strings).
//! Everything downstream of normalization works exclusively with the typed
//! [`Incident`] defined here.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Sort order for upstream queries.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Order {
    /// Newest incidents first.
    #[default]
    New,
    /// Oldest incidents first.
    Old,
}

/// Maximum page length accepted by the upstream feed.
pub const MAX_LENGTH: u32 = 500;

/// Upstream filter fields for one feed query.
///
/// Every field has a documented default so a partially specified query is
/// still deterministic. The canonical serialization of a `QueryParams` value
/// ([`QueryParams::cache_key`]) doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParams {
    /// Sort order (`new` or `old`).
    pub order: Order,
    /// Row offset into the result set.
    pub start: u32,
    /// Rows per page, clamped to `[1, 500]` by [`QueryParams::clamped`].
    pub length: u32,
    /// Free-text search filter.
    pub search: String,
    /// Page number (1-based).
    pub page: u32,
    /// Address filter.
    pub location: String,
    /// Responding unit filter.
    pub unit: String,
    /// Incident type filter.
    #[serde(rename = "type")]
    pub incident_type: String,
    /// Dispatch area filter.
    pub area: String,
    /// Start date (upstream accepts `"Today"` or `YYYY-MM-DD`).
    pub date: String,
    /// End date.
    pub date_end: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            order: Order::New,
            start: 0,
            length: 100,
            search: "Any".to_string(),
            page: 1,
            location: "Any".to_string(),
            unit: "Any".to_string(),
            incident_type: "Any".to_string(),
            area: "Any".to_string(),
            date: "Today".to_string(),
            date_end: "Today".to_string(),
        }
    }
}

impl QueryParams {
    /// Returns a copy with `length` clamped to `[1, 500]`.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.length = self.length.clamp(1, MAX_LENGTH);
        self
    }

    /// Returns the query pairs sent upstream, in field-name order, including
    /// the fixed `draw=1` the feed requires.
    ///
    /// The ordering is deterministic so the same params always produce the
    /// same request URL.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("area", self.area.clone()),
            ("date", self.date.clone()),
            ("dateEnd", self.date_end.clone()),
            ("draw", "1".to_string()),
            ("length", self.length.to_string()),
            ("location", self.location.clone()),
            ("order", self.order.to_string()),
            ("page", self.page.to_string()),
            ("search", self.search.clone()),
            ("start", self.start.to_string()),
            ("type", self.incident_type.clone()),
            ("unit", self.unit.clone()),
        ]
    }

    /// Canonical serialization used as the cache key: fields sorted by name,
    /// defaults applied, no cache-busting nonce.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.query_pairs()
            .into_iter()
            .filter(|(name, _)| *name != "draw")
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Per-unit dispatch lifecycle timestamps, each nullable.
///
/// The upstream reports these as local time strings; they are carried
/// verbatim since only presence/absence matters for classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitTimes {
    /// When the unit was dispatched.
    pub dispatched: Option<String>,
    /// When the unit arrived on scene.
    pub arrived: Option<String>,
    /// When the unit began transport.
    pub transport: Option<String>,
    /// When the unit returned to service. A set value means the unit is done
    /// with the incident.
    pub in_service: Option<String>,
}

/// A single emergency incident, normalized from the upstream feed.
///
/// Incidents are value objects: created fresh on every normalization pass
/// and never mutated or shared by identity across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Upstream row identifier.
    pub id: i64,
    /// Upstream incident number (e.g., `"F250012345"`).
    pub incident_number: String,
    /// Incident type label (e.g., `"Brush Fire"`).
    #[serde(rename = "type")]
    pub incident_type: String,
    /// Short type code (e.g., `"FIR"`).
    pub type_code: Option<String>,
    /// Raw description text.
    pub description: Option<String>,
    /// Cleaned description variant, when the upstream supplies one.
    pub description_clean: Option<String>,
    /// Dispatch address.
    pub address: Option<String>,
    /// Dispatch area.
    pub area: Option<String>,
    /// Responding battalion.
    pub battalion: Option<String>,
    /// The upstream timestamp as Seattle wall-clock time.
    pub datetime_local: DateTime<FixedOffset>,
    /// The same instant converted to UTC.
    pub datetime_utc: DateTime<Utc>,
    /// Latitude (WGS84), or `None` if the upstream value was missing or
    /// unparseable.
    pub latitude: Option<f64>,
    /// Longitude (WGS84).
    pub longitude: Option<f64>,
    /// Responding unit tokens in dispatch order, trailing decoration
    /// stripped. Empty when the upstream listed no units, never null.
    pub units: Vec<String>,
    /// First element of `units`, or `None` when empty.
    pub primary_unit: Option<String>,
    /// Per-unit lifecycle timestamps keyed by unit token.
    pub unit_status: BTreeMap<String, UnitTimes>,
    /// Whether the upstream flags the incident as active.
    pub active: bool,
    /// Whether the upstream flags the incident as a late entry.
    pub late: bool,
    /// Alarm level (1 = first alarm).
    pub alarm: i64,
    /// Upstream fields not otherwise modeled, preserved for debugging.
    /// Classifier logic never consults this.
    pub raw: serde_json::Map<String, serde_json::Value>,
}

/// Metadata extracted from the upstream response envelope.
///
/// Unlike incident fields, every meta field is optional — a partial envelope
/// is tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Page number.
    pub page: Option<u32>,
    /// Total pages available.
    pub total_pages: Option<u64>,
    /// Rows per page.
    pub results_per_page: Option<u64>,
    /// Total incidents matching the query.
    pub total_incidents: Option<u64>,
    /// Row offset.
    pub offset: Option<u64>,
    /// Sort order the upstream applied.
    pub order: Option<String>,
    /// Online-user count the feed reports.
    pub users_online: Option<u64>,
}

/// Provenance for a fetch: where the data came from and whether it was
/// served from cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSource {
    /// The upstream request URL (without any cache-busting nonce).
    pub url: String,
    /// Instant the data was retrieved from upstream.
    pub fetched_at: DateTime<Utc>,
    /// Whether this response was served from the in-memory cache.
    pub cache_hit: bool,
}
