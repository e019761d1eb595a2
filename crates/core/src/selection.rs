//! Best-match selection for ambiguous reference lookups.
//!
//! A reference query (BL, container, or booking number) can legitimately
//! return several shipments, e.g. when a container is reused across
//! voyages. [`best_match`] deterministically picks the single canonical
//! one.

use std::cmp::Reverse;

use crate::types::Shipment;

/// Pick the canonical shipment among candidates for one reference query.
///
/// Discarded entries are set aside first. The remaining candidates are
/// stable-sorted by status priority (active statuses first), tie-broken by
/// most recent `created_at`; ties beyond that keep original array order.
///
/// If every candidate is discarded, the raw first element is returned
/// unsorted. That fallback is intentional: selection must never come back
/// empty while candidates exist.
///
/// Returns `None` only for an empty input slice.
pub fn best_match(candidates: &[Shipment]) -> Option<&Shipment> {
    if candidates.is_empty() {
        return None;
    }

    let mut live: Vec<&Shipment> = candidates.iter().filter(|s| !s.is_discarded()).collect();
    if live.is_empty() {
        return candidates.first();
    }

    live.sort_by_key(|s| (s.status.priority(), Reverse(s.created_at)));
    live.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ShipmentStatus, Timestamp};

    fn shipment(id: &str, status: ShipmentStatus, created_at: &str) -> Shipment {
        let created_at: Timestamp = created_at.parse().expect("valid timestamp");
        Shipment {
            id: id.to_string(),
            request_id: None,
            status,
            container_number: None,
            bl_number: None,
            booking_number: None,
            carrier: None,
            vessel: None,
            pol: None,
            pod: None,
            milestones: Vec::new(),
            coordinates: None,
            created_at,
            updated_at: created_at,
            discarded_at: None,
            reference: None,
        }
    }

    #[test]
    fn empty_input_returns_none() {
        assert!(best_match(&[]).is_none());
    }

    #[test]
    fn single_candidate_is_returned() {
        let list = [shipment("a", ShipmentStatus::Delivered, "2026-01-01T00:00:00Z")];
        assert_eq!(best_match(&list).unwrap().id, "a");
    }

    #[test]
    fn active_status_beats_terminal_status() {
        let list = [
            shipment("delivered", ShipmentStatus::Delivered, "2026-06-01T00:00:00Z"),
            shipment("en_route", ShipmentStatus::EnRoute, "2026-01-01T00:00:00Z"),
            shipment("arrived", ShipmentStatus::Arrived, "2026-05-01T00:00:00Z"),
        ];
        assert_eq!(best_match(&list).unwrap().id, "en_route");
    }

    #[test]
    fn equal_status_prefers_most_recent_creation() {
        let list = [
            shipment("old", ShipmentStatus::EnRoute, "2026-01-01T00:00:00Z"),
            shipment("new", ShipmentStatus::EnRoute, "2026-02-01T00:00:00Z"),
        ];
        assert_eq!(best_match(&list).unwrap().id, "new");
    }

    #[test]
    fn full_tie_keeps_original_order() {
        let list = [
            shipment("first", ShipmentStatus::Pending, "2026-01-01T00:00:00Z"),
            shipment("second", ShipmentStatus::Pending, "2026-01-01T00:00:00Z"),
        ];
        assert_eq!(best_match(&list).unwrap().id, "first");
    }

    #[test]
    fn discarded_candidates_are_skipped() {
        let mut discarded = shipment("gone", ShipmentStatus::EnRoute, "2026-06-01T00:00:00Z");
        discarded.discarded_at = Some("2026-06-02T00:00:00Z".parse().unwrap());
        let list = [
            discarded,
            shipment("live", ShipmentStatus::Delivered, "2026-01-01T00:00:00Z"),
        ];
        assert_eq!(best_match(&list).unwrap().id, "live");
    }

    #[test]
    fn all_discarded_falls_back_to_raw_first_element() {
        // Note: the fallback deliberately skips sorting, so the first array
        // element wins even when a later one has a better status.
        let list = [
            shipment("first", ShipmentStatus::Discarded, "2026-01-01T00:00:00Z"),
            shipment("second", ShipmentStatus::Discarded, "2026-06-01T00:00:00Z"),
        ];
        assert_eq!(best_match(&list).unwrap().id, "first");
    }

    #[test]
    fn selection_is_deterministic_across_reorderings_of_distinct_content() {
        let a = shipment("a", ShipmentStatus::EnRoute, "2026-02-01T00:00:00Z");
        let b = shipment("b", ShipmentStatus::Pending, "2026-03-01T00:00:00Z");
        let c = shipment("c", ShipmentStatus::EnRoute, "2026-01-01T00:00:00Z");

        let forward = [a.clone(), b.clone(), c.clone()];
        let backward = [c, b, a];
        assert_eq!(
            best_match(&forward).unwrap().id,
            best_match(&backward).unwrap().id
        );
    }
}
