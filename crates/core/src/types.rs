//! Canonical shipment types.
//!
//! Everything the client caches or hands back to callers is expressed in
//! these structs. Raw API payloads never leave the mapper in their
//! original shape.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// ShipmentStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a tracked shipment.
///
/// The remote API reports status as free-form text; [`ShipmentStatus::normalize`]
/// folds every observed spelling into one of these six values. Unrecognized
/// input always maps to `Pending` so that a new upstream spelling can never
/// break callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Pending,
    EnRoute,
    Arrived,
    Delivered,
    Discarded,
    NotFound,
}

impl ShipmentStatus {
    /// Canonical wire representation (upper snake case).
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "PENDING",
            ShipmentStatus::EnRoute => "EN_ROUTE",
            ShipmentStatus::Arrived => "ARRIVED",
            ShipmentStatus::Delivered => "DELIVERED",
            ShipmentStatus::Discarded => "DISCARDED",
            ShipmentStatus::NotFound => "NOT_FOUND",
        }
    }

    /// Parse a canonical status string, defaulting to `Pending` for
    /// unknown values.
    pub fn from_str(s: &str) -> Self {
        match s {
            "PENDING" => ShipmentStatus::Pending,
            "EN_ROUTE" => ShipmentStatus::EnRoute,
            "ARRIVED" => ShipmentStatus::Arrived,
            "DELIVERED" => ShipmentStatus::Delivered,
            "DISCARDED" => ShipmentStatus::Discarded,
            "NOT_FOUND" => ShipmentStatus::NotFound,
            _ => ShipmentStatus::Pending,
        }
    }

    /// Normalize a raw upstream status string.
    ///
    /// Upper-cases the input, replaces every character that is not an
    /// ASCII letter or underscore with `_`, then resolves through a fixed
    /// synonym table. Anything the table does not know becomes `Pending`.
    pub fn normalize(raw: &str) -> Self {
        let folded: String = raw
            .to_uppercase()
            .chars()
            .map(|c| {
                if c.is_ascii_uppercase() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        match folded.as_str() {
            "PENDING" => ShipmentStatus::Pending,
            "EN_ROUTE" | "ENROUTE" | "INPROGRESS" | "IN_PROGRESS" | "IN_TRANSIT" | "SAILING" => {
                ShipmentStatus::EnRoute
            }
            "ARRIVED" | "DISCHARGED" | "DISCHARGE" => ShipmentStatus::Arrived,
            "DELIVERED" => ShipmentStatus::Delivered,
            "DISCARDED" => ShipmentStatus::Discarded,
            "NOT_FOUND" | "NOTFOUND" => ShipmentStatus::NotFound,
            _ => ShipmentStatus::Pending,
        }
    }

    /// Cache TTL for a shipment in this status.
    ///
    /// Terminal or stable states live longer in the cache; states that are
    /// expected to change soon expire quickly.
    ///
    /// | Status               | TTL  |
    /// |----------------------|------|
    /// | Pending / EnRoute    | 2 h  |
    /// | Arrived              | 4 h  |
    /// | Delivered / Discarded| 24 h |
    /// | NotFound             | 2 h  |
    pub fn cache_ttl(&self) -> Duration {
        match self {
            ShipmentStatus::Pending | ShipmentStatus::EnRoute | ShipmentStatus::NotFound => {
                Duration::from_secs(2 * 60 * 60)
            }
            ShipmentStatus::Arrived => Duration::from_secs(4 * 60 * 60),
            ShipmentStatus::Delivered | ShipmentStatus::Discarded => {
                Duration::from_secs(24 * 60 * 60)
            }
        }
    }

    /// Sort priority for best-match selection. Lower is better.
    ///
    /// Active statuses rank first so that an in-transit record wins over a
    /// long-delivered one when a reference lookup is ambiguous.
    pub fn priority(&self) -> u8 {
        match self {
            ShipmentStatus::EnRoute => 0,
            ShipmentStatus::Pending => 1,
            ShipmentStatus::Arrived => 2,
            ShipmentStatus::Delivered => 3,
            ShipmentStatus::Discarded => 4,
            ShipmentStatus::NotFound => 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Nested value objects
// ---------------------------------------------------------------------------

/// Vessel currently carrying the shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub name: String,
    /// IMO number, when the carrier reports one.
    pub imo: Option<String>,
}

/// A port involved in the voyage (loading or discharge).
///
/// For the port of loading only `departure` is meaningful; for the port of
/// discharge `eta` and `ata` are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub code: Option<String>,
    pub name: Option<String>,
    pub departure: Option<Timestamp>,
    pub eta: Option<Timestamp>,
    pub ata: Option<Timestamp>,
}

/// Last known vessel position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A single tracking event.
///
/// Milestones are append-only and owned by exactly one shipment; their
/// order is the upstream array order and is never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub event: String,
    pub location: Option<String>,
    pub timestamp: Option<Timestamp>,
    /// `false` for projected/estimated events. Defaults to `true` when the
    /// upstream payload omits the flag.
    pub is_actual: bool,
}

// ---------------------------------------------------------------------------
// Shipment
// ---------------------------------------------------------------------------

/// Canonical tracking record.
///
/// Produced only by mapping a raw API response; a fresher record is
/// obtained by re-mapping a fresher response, never by editing fields in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    /// Stable identifier, shared between cache and API.
    pub id: String,
    /// Transitional request identifier some endpoints still return.
    pub request_id: Option<String>,
    pub status: ShipmentStatus,
    pub container_number: Option<String>,
    pub bl_number: Option<String>,
    pub booking_number: Option<String>,
    pub carrier: Option<String>,
    pub vessel: Option<Vessel>,
    /// Port of loading.
    pub pol: Option<Port>,
    /// Port of discharge.
    pub pod: Option<Port>,
    pub milestones: Vec<Milestone>,
    pub coordinates: Option<Coordinates>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Set once the upstream discards the tracking entry. Discarded
    /// shipments are excluded from cache reuse but never deleted.
    pub discarded_at: Option<Timestamp>,
    /// Caller-assigned custom reference.
    pub reference: Option<String>,
}

impl Shipment {
    /// Whether the upstream has discarded this tracking entry.
    pub fn is_discarded(&self) -> bool {
        self.discarded_at.is_some() || self.status == ShipmentStatus::Discarded
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- normalize --

    #[test]
    fn normalize_maps_transit_synonyms_to_en_route() {
        for raw in ["IN TRANSIT", "in_transit", "InProgress", "Sailing", "EN ROUTE"] {
            assert_eq!(ShipmentStatus::normalize(raw), ShipmentStatus::EnRoute);
        }
    }

    #[test]
    fn normalize_maps_discharged_to_arrived() {
        assert_eq!(
            ShipmentStatus::normalize("Discharged"),
            ShipmentStatus::Arrived
        );
    }

    #[test]
    fn normalize_defaults_unknown_to_pending() {
        for raw in ["", "UNKNOWN", "LOST AT SEA", "42"] {
            assert_eq!(ShipmentStatus::normalize(raw), ShipmentStatus::Pending);
        }
    }

    #[test]
    fn normalize_folds_punctuation_to_underscore() {
        assert_eq!(
            ShipmentStatus::normalize("not-found"),
            ShipmentStatus::NotFound
        );
    }

    #[test]
    fn from_str_round_trips_as_str() {
        for status in [
            ShipmentStatus::Pending,
            ShipmentStatus::EnRoute,
            ShipmentStatus::Arrived,
            ShipmentStatus::Delivered,
            ShipmentStatus::Discarded,
            ShipmentStatus::NotFound,
        ] {
            assert_eq!(ShipmentStatus::from_str(status.as_str()), status);
        }
    }

    // -- cache_ttl --

    #[test]
    fn arrived_ttl_is_twice_pending() {
        let pending = ShipmentStatus::Pending.cache_ttl();
        assert_eq!(ShipmentStatus::Arrived.cache_ttl(), pending * 2);
    }

    #[test]
    fn delivered_ttl_is_six_times_pending() {
        let pending = ShipmentStatus::Pending.cache_ttl();
        assert_eq!(ShipmentStatus::Delivered.cache_ttl(), pending * 6);
    }

    #[test]
    fn en_route_and_pending_share_ttl() {
        assert_eq!(
            ShipmentStatus::EnRoute.cache_ttl(),
            ShipmentStatus::Pending.cache_ttl()
        );
    }

    // -- priority --

    #[test]
    fn priority_is_a_strict_total_order() {
        let ordered = [
            ShipmentStatus::EnRoute,
            ShipmentStatus::Pending,
            ShipmentStatus::Arrived,
            ShipmentStatus::Delivered,
            ShipmentStatus::Discarded,
            ShipmentStatus::NotFound,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].priority() < pair[1].priority());
        }
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&ShipmentStatus::EnRoute).unwrap();
        assert_eq!(json, "\"EN_ROUTE\"");
    }
}
