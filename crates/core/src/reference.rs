//! Reference kinds and client-side format validation.
//!
//! A shipment can be tracked by one of three mutually independent
//! identifiers: Bill of Lading, container number, or booking number. The
//! format checks here are advisory only — a mismatch produces a warning at
//! the call site, never a rejected request, because carriers do not apply
//! the nominal formats uniformly.

use std::sync::LazyLock;

use regex::Regex;

/// ISO 6346 style container number: 4 letters + 7 digits.
static CONTAINER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{4}\d{7}$").expect("valid regex"));

/// Bill of Lading: 4-letter carrier prefix + 8-12 digits.
static BL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{4}\d{8,12}$").expect("valid regex"));

/// Booking number: 6-20 alphanumeric characters.
static BOOKING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{6,20}$").expect("valid regex"));

/// One of the three identifiers a shipment may be tracked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    BillOfLading,
    Container,
    Booking,
}

impl ReferenceKind {
    /// Query-filter field name used by the listing endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::BillOfLading => "bl_number",
            ReferenceKind::Container => "container_number",
            ReferenceKind::Booking => "booking_number",
        }
    }

    /// Whether `value` matches the nominal format for this kind.
    ///
    /// Expects an already-normalized (upper-cased) value.
    pub fn matches_format(&self, value: &str) -> bool {
        match self {
            ReferenceKind::Container => CONTAINER_RE.is_match(value),
            ReferenceKind::BillOfLading => BL_RE.is_match(value),
            ReferenceKind::Booking => BOOKING_RE.is_match(value),
        }
    }
}

/// Normalize a reference number for querying and cache keying.
///
/// Trims surrounding whitespace and upper-cases, so that `hamu1058953` and
/// `HAMU1058953` address the same cache entry and remote record.
pub fn normalize_reference(value: &str) -> String {
    value.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_reference("  hamu1058953 "), "HAMU1058953");
    }

    #[test]
    fn container_format_accepts_four_letters_seven_digits() {
        assert!(ReferenceKind::Container.matches_format("HAMU1058953"));
    }

    #[test]
    fn container_format_rejects_wrong_lengths() {
        assert!(!ReferenceKind::Container.matches_format("HAMU105895"));
        assert!(!ReferenceKind::Container.matches_format("HAMU10589531"));
        assert!(!ReferenceKind::Container.matches_format("HAM1058953"));
    }

    #[test]
    fn bl_format_accepts_eight_to_twelve_digits() {
        assert!(ReferenceKind::BillOfLading.matches_format("MAEU12345678"));
        assert!(ReferenceKind::BillOfLading.matches_format("MAEU123456789012"));
        assert!(!ReferenceKind::BillOfLading.matches_format("MAEU1234567"));
        assert!(!ReferenceKind::BillOfLading.matches_format("MAEU1234567890123"));
    }

    #[test]
    fn booking_format_accepts_six_to_twenty_alphanumerics() {
        assert!(ReferenceKind::Booking.matches_format("ABC123"));
        assert!(ReferenceKind::Booking.matches_format("A1B2C3D4E5F6G7H8I9J0"));
        assert!(!ReferenceKind::Booking.matches_format("AB12"));
        assert!(!ReferenceKind::Booking.matches_format("ABC-123"));
    }

    #[test]
    fn kind_maps_to_listing_filter_name() {
        assert_eq!(ReferenceKind::BillOfLading.as_str(), "bl_number");
        assert_eq!(ReferenceKind::Container.as_str(), "container_number");
        assert_eq!(ReferenceKind::Booking.as_str(), "booking_number");
    }
}
