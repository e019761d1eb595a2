//! Canonical domain model for ocean freight tracking.
//!
//! This crate is the schema boundary between the loosely-typed remote
//! tracking API and the rest of the client: raw JSON payloads enter
//! through [`mapper::map_shipment`] and come out as stable
//! [`types::Shipment`] values, ambiguous multi-candidate lookups are
//! resolved by [`selection::best_match`], and the three reference-number
//! kinds a shipment can be tracked by live in [`reference`].

pub mod mapper;
pub mod reference;
pub mod selection;
pub mod types;
