//! Normalization of raw upstream responses into canonical incidents.
//!
//! The upstream feed's shapes vary: the `data` array may hold incident
//! objects directly or index-keyed wrapper objects, coordinates arrive as
//! numbers, numeric strings, or `{source, parsedValue}` objects, booleans as
//! `1`/`"1"`/`true`, and units as decorated comma strings like `"E16*,L9"`.
//! Everything here is deterministic and order-independent across incidents:
//! either every incident in a response coerces fully, or the whole response
//! fails with [`FeedError::SchemaValidation`] naming the first bad field.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone as _, Utc};
use regex::Regex;
use serde_json::Value;
use sfd_feed_models::{Incident, ResponseMeta, UnitTimes};

use crate::FeedError;

/// The feed reports wall-clock times in Seattle's zone unless a timestamp
/// carries explicit offset information.
const SEATTLE_TZ: chrono_tz::Tz = chrono_tz::America::Los_Angeles;

/// Incident fields handled explicitly by [`normalize_incident`]; everything
/// else is preserved verbatim in [`Incident::raw`].
const MODELED_FIELDS: &[&str] = &[
    "id",
    "incident_number",
    "type",
    "type_code",
    "description",
    "description_clean",
    "address",
    "area",
    "battalion",
    "datetime",
    "timestamp",
    "latitude",
    "longitude",
    "units",
    "units_dispatched",
    "primary_unit",
    "unit_status",
    "active",
    "late",
    "alarm",
];

/// Keys whose presence marks an object as an incident payload (rather than
/// an index-keyed wrapper around one).
const INCIDENT_MARKER_KEYS: &[&str] = &["id", "address", "type", "incident_number", "datetime"];

fn schema_error(path: impl Into<String>) -> FeedError {
    FeedError::SchemaValidation { path: path.into() }
}

/// Normalizes a full upstream response into envelope metadata and canonical
/// incidents.
///
/// # Errors
///
/// Returns [`FeedError::SchemaValidation`] with the path of the first field
/// that could not be coerced. Meta fields are tolerated when missing;
/// incident fields (other than coordinates) are not.
pub fn normalize_response(raw: &Value) -> Result<(ResponseMeta, Vec<Incident>), FeedError> {
    let envelope = raw.as_object().ok_or_else(|| schema_error("$"))?;
    let data = envelope
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| schema_error("data"))?;

    let records = flatten_data(data);
    let incidents = records
        .iter()
        .enumerate()
        .map(|(idx, record)| normalize_incident(record, idx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((normalize_meta(envelope), incidents))
}

/// Flattens the upstream `data` array into plain incident objects,
/// preserving order.
///
/// Handles both the current direct format (`[{...incident...}]`) and the
/// legacy index-keyed format (`[{"0": {...incident...}}]`). Non-object array
/// elements are dropped.
fn flatten_data(data: &[Value]) -> Vec<&serde_json::Map<String, Value>> {
    let mut records = Vec::with_capacity(data.len());

    for item in data {
        let Some(obj) = item.as_object() else {
            continue;
        };

        if INCIDENT_MARKER_KEYS.iter().any(|key| obj.contains_key(*key)) {
            records.push(obj);
            continue;
        }

        // Index-keyed wrapper: take the first value that looks like an
        // incident, preferring key "0".
        let nested = obj
            .get("0")
            .and_then(Value::as_object)
            .or_else(|| {
                obj.values().filter_map(Value::as_object).find(|inner| {
                    INCIDENT_MARKER_KEYS.iter().any(|key| inner.contains_key(*key))
                })
            });
        if let Some(inner) = nested {
            records.push(inner);
        }
    }

    records
}

fn normalize_incident(
    record: &serde_json::Map<String, Value>,
    idx: usize,
) -> Result<Incident, FeedError> {
    let path = |field: &str| format!("data[{idx}].{field}");

    let id = parse_i64(record.get("id")).ok_or_else(|| schema_error(path("id")))?;
    let incident_number =
        opt_string(record.get("incident_number")).ok_or_else(|| schema_error(path("incident_number")))?;

    let datetime_raw = record
        .get("datetime")
        .or_else(|| record.get("timestamp"))
        .and_then(Value::as_str)
        .ok_or_else(|| schema_error(path("datetime")))?;
    let (datetime_local, datetime_utc) =
        parse_datetime(datetime_raw).ok_or_else(|| schema_error(path("datetime")))?;

    let units = parse_units_field(record.get("units_dispatched").or_else(|| record.get("units")));
    let primary_unit = units.first().cloned();

    let active = parse_bool(record.get("active")).ok_or_else(|| schema_error(path("active")))?;
    let late = parse_bool(record.get("late")).ok_or_else(|| schema_error(path("late")))?;

    let alarm = match record.get("alarm") {
        None | Some(Value::Null) => 1,
        value => parse_i64(value).ok_or_else(|| schema_error(path("alarm")))?,
    };

    let mut raw = record.clone();
    raw.retain(|key, _| !MODELED_FIELDS.contains(&key.as_str()));

    Ok(Incident {
        id,
        incident_number,
        incident_type: opt_string(record.get("type")).unwrap_or_default(),
        type_code: opt_string(record.get("type_code")),
        description: opt_string(record.get("description")),
        description_clean: opt_string(record.get("description_clean")),
        address: opt_string(record.get("address")),
        area: opt_string(record.get("area")),
        battalion: opt_string(record.get("battalion")),
        datetime_local,
        datetime_utc,
        latitude: parse_coordinate(record.get("latitude")),
        longitude: parse_coordinate(record.get("longitude")),
        units,
        primary_unit,
        unit_status: parse_unit_status(record.get("unit_status")),
        active,
        late,
        alarm,
        raw,
    })
}

/// Parses an upstream timestamp into the Seattle-local instant and its UTC
/// equivalent.
///
/// A timestamp with explicit offset information (RFC 3339) is honored as
/// declared. Otherwise the bare `"YYYY-MM-DD HH:MM:SS"` string (a `T`
/// separator is also accepted) is interpreted in `America/Los_Angeles`,
/// resolving daylight vs standard time by calendar date. Ambiguous
/// fall-back instants resolve to the earlier offset; instants skipped by
/// the spring-forward transition do not exist and yield `None`.
fn parse_datetime(s: &str) -> Option<(DateTime<FixedOffset>, DateTime<Utc>)> {
    if let Ok(declared) = DateTime::parse_from_rfc3339(s) {
        let utc = declared.with_timezone(&Utc);
        return Some((utc.with_timezone(&SEATTLE_TZ).fixed_offset(), utc));
    }

    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    let local = SEATTLE_TZ.from_local_datetime(&naive).earliest()?;
    Some((local.fixed_offset(), local.with_timezone(&Utc)))
}

/// Resolves the upstream's object-or-scalar coordinate field to a plain
/// float, or `None`. Coordinate absence is always recoverable — this never
/// errors.
fn parse_coordinate(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(obj) => ["parsedValue", "value", "lat", "lng", "latitude", "longitude"]
            .iter()
            .find_map(|key| parse_coordinate(obj.get(*key))),
        _ => None,
    }
}

/// Splits a raw unit-dispatch string into clean unit tokens.
///
/// Tokens are separated by commas/whitespace; trailing decoration characters
/// (a `*` marks a dispatched-but-unconfirmed unit) are stripped. Order is
/// preserved and empty tokens dropped.
fn parse_units(s: &str) -> Vec<String> {
    let separator = Regex::new(r"[,\s]+").unwrap_or_else(|_| unreachable!());
    let decoration = Regex::new(r"[*+#\-]+$").unwrap_or_else(|_| unreachable!());

    separator
        .split(s)
        .map(|token| decoration.replace(token.trim(), "").to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

fn parse_units_field(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => parse_units(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .flat_map(parse_units)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_unit_status(value: Option<&Value>) -> BTreeMap<String, UnitTimes> {
    let mut status = BTreeMap::new();
    let Some(Value::Object(map)) = value else {
        return status;
    };

    for (unit, times) in map {
        let Some(times) = times.as_object() else {
            continue;
        };
        status.insert(
            unit.clone(),
            UnitTimes {
                dispatched: opt_string(times.get("dispatched")),
                arrived: opt_string(times.get("arrived")),
                transport: opt_string(times.get("transport")),
                in_service: opt_string(times.get("in_service")),
            },
        );
    }

    status
}

/// Deterministic boolean coercion for the upstream's numeric/stringy truthy
/// encodings. Anything outside the documented value set is a schema error
/// at the caller.
fn parse_bool(value: Option<&Value>) -> Option<bool> {
    match value {
        None | Some(Value::Null) => Some(false),
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces scalar JSON values to an owned string; `None` for null, absent,
/// empty, or structured values.
fn opt_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn opt_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extracts envelope metadata. Every field is optional — a partial envelope
/// is normal, unlike incident fields.
fn normalize_meta(envelope: &serde_json::Map<String, Value>) -> ResponseMeta {
    ResponseMeta {
        page: opt_u64(envelope.get("page")).and_then(|v| u32::try_from(v).ok()),
        total_pages: opt_u64(envelope.get("totalPages")),
        results_per_page: opt_u64(envelope.get("length"))
            .or_else(|| opt_u64(envelope.get("recordsFiltered"))),
        total_incidents: opt_u64(envelope.get("recordsTotal")),
        offset: opt_u64(envelope.get("start")),
        order: opt_string(envelope.get("order")),
        users_online: opt_u64(envelope.get("users_online")),
    }
}
