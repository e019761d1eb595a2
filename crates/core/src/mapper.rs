//! Raw-payload to canonical-shipment mapping.
//!
//! The remote API is loosely typed: the same logical field arrives under a
//! camelCase name on some endpoints and a snake_case name on others, nested
//! objects are sometimes flattened to the top level, and timestamps come in
//! several textual forms. Each logical field therefore has an explicit
//! ordered list of source-name candidates, resolved first-present-wins.
//! Shape is never inferred at runtime.

use serde_json::Value;

use crate::types::{
    Coordinates, Milestone, Port, Shipment, ShipmentStatus, Timestamp, Vessel,
};

// ---------------------------------------------------------------------------
// Field access helpers
// ---------------------------------------------------------------------------

/// Return the first candidate field that is present and non-null.
fn pick<'a>(obj: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|name| obj.get(name))
        .find(|v| !v.is_null())
}

/// First present candidate, coerced to an owned string.
///
/// Numbers are stringified because the API switches between numeric and
/// string identifiers across endpoints.
fn pick_string(obj: &Value, candidates: &[&str]) -> Option<String> {
    match pick(obj, candidates)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First present candidate, coerced to f64.
fn pick_f64(obj: &Value, candidates: &[&str]) -> Option<f64> {
    let v = pick(obj, candidates)?;
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// First present candidate, parsed as a timestamp.
fn pick_timestamp(obj: &Value, candidates: &[&str]) -> Option<Timestamp> {
    parse_timestamp(pick(obj, candidates)?)
}

/// Parse a timestamp value in any of the forms the API emits.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, and bare `YYYY-MM-DD` (midnight
/// UTC). Anything else maps to `None` rather than an error; a missing
/// timestamp is always a valid state.
fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    let s = value.as_str()?;

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

// ---------------------------------------------------------------------------
// Nested object mapping
// ---------------------------------------------------------------------------

/// Vessel from a nested object or top-level `vessel_name`/`vessel_imo`
/// fields. `None` when no source field is present at all, so callers never
/// see an empty placeholder vessel.
fn map_vessel(raw: &Value) -> Option<Vessel> {
    if let Some(obj) = pick(raw, &["vessel"]).filter(|v| v.is_object()) {
        let name = pick_string(obj, &["name", "vessel_name", "vesselName"])?;
        return Some(Vessel {
            name,
            imo: pick_string(obj, &["imo", "imo_number", "imoNumber"]),
        });
    }

    let name = pick_string(raw, &["vessel_name", "vesselName"])?;
    Some(Vessel {
        name,
        imo: pick_string(raw, &["vessel_imo", "vesselImo"]),
    })
}

/// A port object under any of `container_names`, populated only when at
/// least one subfield resolves.
fn map_port(raw: &Value, container_names: &[&str]) -> Option<Port> {
    let obj = pick(raw, container_names).filter(|v| v.is_object())?;

    let port = Port {
        code: pick_string(obj, &["code", "port_code", "portCode"]),
        name: pick_string(obj, &["name", "port_name", "portName"]),
        departure: pick_timestamp(obj, &["departure", "departure_date", "departureDate"]),
        eta: pick_timestamp(obj, &["eta", "eta_date", "etaDate"]),
        ata: pick_timestamp(obj, &["ata", "ata_date", "ataDate"]),
    };

    let empty = port.code.is_none()
        && port.name.is_none()
        && port.departure.is_none()
        && port.eta.is_none()
        && port.ata.is_none();
    (!empty).then_some(port)
}

/// Coordinates from a nested `coordinates`/`position` object or top-level
/// `latitude`/`longitude` fields.
fn map_coordinates(raw: &Value) -> Option<Coordinates> {
    if let Some(obj) = pick(raw, &["coordinates", "position"]).filter(|v| v.is_object()) {
        let lat = pick_f64(obj, &["lat", "latitude"])?;
        let lng = pick_f64(obj, &["lng", "lon", "longitude"])?;
        return Some(Coordinates { lat, lng });
    }

    let lat = pick_f64(raw, &["latitude"])?;
    let lng = pick_f64(raw, &["longitude"])?;
    Some(Coordinates { lat, lng })
}

/// Milestones arrive under `milestones` or `events`; entries that are not
/// objects are skipped. `is_actual` defaults to `true` when absent.
fn map_milestones(raw: &Value) -> Vec<Milestone> {
    let Some(entries) = pick(raw, &["milestones", "events"]).and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| entry.is_object())
        .map(|entry| Milestone {
            event: pick_string(entry, &["event", "name", "description"]).unwrap_or_default(),
            location: pick_string(entry, &["location", "port", "place"]),
            timestamp: pick_timestamp(entry, &["timestamp", "date", "event_date", "eventDate"]),
            is_actual: pick(entry, &["is_actual", "isActual"])
                .and_then(Value::as_bool)
                .unwrap_or(true),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Shipment mapping
// ---------------------------------------------------------------------------

/// Map an arbitrary raw shipment payload into the canonical shape.
///
/// Total: every field degrades to `None`/empty rather than failing, and an
/// unrecognized status becomes [`ShipmentStatus::Pending`]. `created_at`
/// and `updated_at` default to now when the upstream omits them.
pub fn map_shipment(raw: &Value) -> Shipment {
    let now = chrono::Utc::now();

    let status = pick_string(raw, &["status", "status_name", "statusName"])
        .map(|s| ShipmentStatus::normalize(&s))
        .unwrap_or(ShipmentStatus::Pending);

    Shipment {
        id: pick_string(raw, &["id", "shipment_id", "shipmentId"]).unwrap_or_default(),
        request_id: pick_string(raw, &["request_id", "requestId"]),
        status,
        container_number: pick_string(raw, &["container_number", "containerNumber"]),
        bl_number: pick_string(raw, &["bl_number", "blNumber"]),
        booking_number: pick_string(raw, &["booking_number", "bookingNumber"]),
        carrier: pick_string(raw, &["carrier", "carrier_name", "carrierName"]),
        vessel: map_vessel(raw),
        pol: map_port(raw, &["pol", "port_of_loading", "portOfLoading"]),
        pod: map_port(raw, &["pod", "port_of_discharge", "portOfDischarge"]),
        milestones: map_milestones(raw),
        coordinates: map_coordinates(raw),
        created_at: pick_timestamp(raw, &["created_at", "createdAt"]).unwrap_or(now),
        updated_at: pick_timestamp(raw, &["updated_at", "updatedAt"]).unwrap_or(now),
        discarded_at: pick_timestamp(raw, &["discarded_at", "discardedAt"]),
        reference: pick_string(raw, &["reference", "custom_reference", "customReference"]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
