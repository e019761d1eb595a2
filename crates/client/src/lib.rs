//! Credit-aware client for the ShipsGo ocean freight tracking API.
//!
//! The remote API meters shipment creation: every successfully created
//! tracking entry consumes a paid credit, while reads are free. This crate
//! wraps the API so that credits are spent only when strictly necessary —
//! lookups are served from a TTL cache where possible, creates deduplicate
//! against existing upstream entries on conflict, transient failures are
//! retried with exponential backoff, and the remaining call budget is
//! tracked from response headers with a local sliding-window estimate as
//! fallback.
//!
//! Entry point is [`service::TrackingService`]; construct one via
//! [`service::TrackingService::from_env`] or inject a custom
//! [`transport::Transport`] for testing.

pub mod cache;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod service;
pub mod transport;
