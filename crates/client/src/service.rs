//! Tracking/query service: the public surface of the client.
//!
//! [`TrackingService`] orchestrates the cache facade, retry policy, rate
//! limit tracker, and response mapper around one [`Transport`]. The
//! governing rule is credit awareness: a credit is consumed only by
//! successfully creating a new upstream tracking entry, so every create
//! first consults the cache, and a 409 conflict is resolved by fetching
//! the existing entry instead of failing.
//!
//! Every public operation is a single logical call that suspends only at
//! I/O; there is no background scheduler.

use std::time::Duration;

use serde_json::{json, Value};

use oceantrack_core::mapper::map_shipment;
use oceantrack_core::reference::{normalize_reference, ReferenceKind};
use oceantrack_core::selection::best_match;
use oceantrack_core::types::{Coordinates, Shipment, ShipmentStatus};

use crate::cache::{keys, CacheStats, TtlCache};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::{FileRateLimitStore, RateLimitStatus, RateLimitStore, RateLimitTracker};
use crate::retry::with_retry_config;
use crate::transport::{HttpTransport, RawResponse, Transport};

/// Collection endpoint for ocean shipments.
const SHIPMENTS_PATH: &str = "/ocean/shipments";

/// Listings and searches are volatile; they expire quickly.
const LIST_TTL: Duration = Duration::from_secs(15 * 60);

/// Vessel positions move, but not by much in half an hour.
const POSITION_TTL: Duration = Duration::from_secs(30 * 60);

/// Sharing tokens are stable once issued.
const SHARING_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Public map host. The link format is part of the external contract and
/// must be reproduced exactly.
const SHARING_LINK_BASE: &str = "https://map.shipsgo.com/ocean/shipments";

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// Reference numbers for a create request. At least one must be set.
#[derive(Debug, Clone, Default)]
pub struct CreateShipmentRequest {
    pub bl_number: Option<String>,
    pub container_number: Option<String>,
    pub booking_number: Option<String>,
}

impl CreateShipmentRequest {
    /// The first provided reference, in BL > container > booking order.
    fn origin_reference(&self) -> Option<(ReferenceKind, &str)> {
        if let Some(v) = &self.bl_number {
            return Some((ReferenceKind::BillOfLading, v));
        }
        if let Some(v) = &self.container_number {
            return Some((ReferenceKind::Container, v));
        }
        if let Some(v) = &self.booking_number {
            return Some((ReferenceKind::Booking, v));
        }
        None
    }

    /// Flat create body with normalized reference numbers.
    fn to_body(&self) -> Value {
        let mut body = json!({ "shipment_type": "ocean" });
        if let Some(v) = &self.bl_number {
            body["bl_number"] = Value::String(normalize_reference(v));
        }
        if let Some(v) = &self.container_number {
            body["container_number"] = Value::String(normalize_reference(v));
        }
        if let Some(v) = &self.booking_number {
            body["booking_number"] = Value::String(normalize_reference(v));
        }
        body
    }
}

/// Where a create result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateSource {
    /// A new upstream tracking entry was created. One credit was spent.
    Created,
    /// The upstream already tracked this reference (409); the existing
    /// entry was fetched instead. No credit spent.
    Existing,
    /// Served from the local cache without any remote call.
    Cached,
}

/// Result of [`TrackingService::create_shipment`].
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub shipment: Shipment,
    pub source: CreateSource,
    pub credit_used: bool,
    /// Non-fatal problem in an auxiliary step (e.g. the custom-reference
    /// patch failed after a successful create). The primary operation
    /// still succeeded.
    pub warning: Option<String>,
}

/// Filters for the listing endpoint. `None` fields are omitted from the
/// query string.
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub bl_number: Option<String>,
    pub container_number: Option<String>,
    pub booking_number: Option<String>,
    pub reference: Option<String>,
    pub status: Option<ShipmentStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Calendar date, `YYYY-MM-DD`.
    pub eta_from: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    pub eta_to: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl ListFilters {
    /// Query pairs with reference numbers normalized, so that equivalent
    /// filters produce identical requests and cache keys.
    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(v) = &self.bl_number {
            query.push(("bl_number".into(), normalize_reference(v)));
        }
        if let Some(v) = &self.container_number {
            query.push(("container_number".into(), normalize_reference(v)));
        }
        if let Some(v) = &self.booking_number {
            query.push(("booking_number".into(), normalize_reference(v)));
        }
        if let Some(v) = &self.reference {
            query.push(("reference".into(), v.clone()));
        }
        if let Some(v) = &self.status {
            query.push(("status".into(), v.as_str().to_string()));
        }
        if let Some(v) = &self.limit {
            query.push(("limit".into(), v.to_string()));
        }
        if let Some(v) = &self.offset {
            query.push(("offset".into(), v.to_string()));
        }
        if let Some(v) = &self.eta_from {
            query.push(("eta_from".into(), v.clone()));
        }
        if let Some(v) = &self.eta_to {
            query.push(("eta_to".into(), v.clone()));
        }
        if let Some(v) = &self.sort {
            query.push(("sort".into(), v.clone()));
        }
        if let Some(v) = &self.order {
            query.push(("order".into(), v.clone()));
        }
        query
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Credit-aware tracking client over one [`Transport`].
pub struct TrackingService<T: Transport> {
    config: ClientConfig,
    transport: T,
    cache: TtlCache,
    rate_limit: RateLimitTracker,
}

impl TrackingService<HttpTransport> {
    /// Build a production service from environment variables.
    pub fn from_env() -> ApiResult<Self> {
        Ok(Self::from_config(ClientConfig::from_env()?))
    }

    /// Build a production service from an explicit configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        let transport = HttpTransport::new(&config);
        let store = FileRateLimitStore::new(config.rate_limit_path.clone());
        Self::with_parts(config, transport, Box::new(store))
    }
}

impl<T: Transport> TrackingService<T> {
    /// Assemble a service from explicit parts. This is the injection
    /// point for custom transports and rate-limit stores.
    pub fn with_parts(
        config: ClientConfig,
        transport: T,
        rate_limit_store: Box<dyn RateLimitStore>,
    ) -> Self {
        Self {
            config,
            transport,
            cache: TtlCache::new(),
            rate_limit: RateLimitTracker::new(rate_limit_store),
        }
    }

    // -- plumbing ----------------------------------------------------------

    /// One logical remote call: retry-wrapped send, rate-limit headers
    /// recorded on every response, status classified afterwards.
    async fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> ApiResult<RawResponse> {
        let transport = &self.transport;
        let rate_limit = &self.rate_limit;
        with_retry_config(
            self.config.max_retries,
            self.config.base_delay,
            move || async move {
                let raw = transport.send(method, path, query, body).await?;
                rate_limit.record_response(&raw.headers);
                raw.error_for_status()
            },
        )
        .await
    }

    /// Unwrap a single-shipment payload from either envelope shape.
    fn shipment_payload(raw: &RawResponse) -> ApiResult<&Value> {
        let body = raw
            .body
            .as_ref()
            .ok_or_else(|| ApiError::Decode("empty response body".into()))?;
        Ok(body
            .get("shipment")
            .or_else(|| body.get("data"))
            .filter(|v| v.is_object())
            .unwrap_or(body))
    }

    /// Map a listing payload (`shipments` or `data` array) to shipments.
    fn listing_payload(body: &Value) -> Vec<Shipment> {
        body.get("shipments")
            .or_else(|| body.get("data"))
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(map_shipment).collect())
            .unwrap_or_default()
    }

    /// Fetch a listing, treating 404 as an empty result rather than an
    /// error.
    async fn fetch_listing(&self, query: &[(String, String)]) -> ApiResult<Vec<Shipment>> {
        match self.request("GET", SHIPMENTS_PATH, query, None).await {
            Ok(raw) => Ok(raw
                .body
                .as_ref()
                .map(Self::listing_payload)
                .unwrap_or_default()),
            Err(ApiError::Api { status: 404, .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Write a shipment into the cache under its ID key and, optionally,
    /// the reference key it was resolved through. TTL follows status.
    fn cache_shipment(&self, shipment: &Shipment, reference_key: Option<&str>) {
        let Ok(value) = serde_json::to_value(shipment) else {
            return;
        };
        let ttl = shipment.status.cache_ttl();
        self.cache.set(&keys::shipment(&shipment.id), value.clone(), ttl);
        if let Some(key) = reference_key {
            self.cache.set(key, value, ttl);
        }
    }

    fn decode_shipment(value: Value) -> ApiResult<Shipment> {
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // -- create ------------------------------------------------------------

    /// Create a tracking entry for a shipment, spending a credit only
    /// when the upstream does not already track it.
    ///
    /// Resolution order:
    /// 1. A fresh, non-discarded cache entry for the origin reference is
    ///    returned as-is (no remote call, no credit).
    /// 2. `POST /ocean/shipments`; on success the optional custom
    ///    `reference` is patched best-effort and a failure there becomes
    ///    a warning on the outcome, never an error.
    /// 3. A 409 conflict means the upstream already tracks this
    ///    reference: the existing entry is fetched through the matching
    ///    reference-kind tracker (no credit). A conflict the API then
    ///    cannot resolve is an integrity error.
    ///
    /// 402 surfaces immediately as [`ApiError::InsufficientCredits`];
    /// 429 is retried and surfaces only after retry exhaustion.
    pub async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
        reference: Option<&str>,
    ) -> ApiResult<CreateOutcome> {
        let (kind, number) = request.origin_reference().ok_or_else(|| {
            ApiError::Config(
                "at least one of bl_number, container_number, or booking_number is required"
                    .into(),
            )
        })?;
        let number = normalize_reference(number);
        warn_on_format_mismatch(kind, &number);

        let cache_key = keys::reference(kind, &number);
        if let Some(value) = self.cache.get(&cache_key) {
            if let Ok(shipment) = serde_json::from_value::<Shipment>(value) {
                // Discarded entries stay cached but never satisfy a create.
                if !shipment.is_discarded() {
                    tracing::debug!(reference = %number, "Create served from cache");
                    return Ok(CreateOutcome {
                        shipment,
                        source: CreateSource::Cached,
                        credit_used: false,
                        warning: None,
                    });
                }
            }
        }

        let body = request.to_body();
        match self.request("POST", SHIPMENTS_PATH, &[], Some(&body)).await {
            Ok(raw) => {
                let shipment = map_shipment(Self::shipment_payload(&raw)?);
                let warning = match reference {
                    Some(custom) => self.assign_reference(&shipment.id, custom).await,
                    None => None,
                };
                self.cache_shipment(&shipment, Some(&cache_key));
                tracing::info!(
                    shipment_id = %shipment.id,
                    reference = %number,
                    "Created tracking entry, credit used",
                );
                Ok(CreateOutcome {
                    shipment,
                    source: CreateSource::Created,
                    credit_used: true,
                    warning,
                })
            }
            Err(ApiError::Api { status: 409, .. }) => {
                tracing::debug!(reference = %number, "Create conflict, fetching existing entry");
                match self.track_by(kind, &number).await? {
                    Some(shipment) => Ok(CreateOutcome {
                        shipment,
                        source: CreateSource::Existing,
                        credit_used: false,
                        warning: None,
                    }),
                    None => Err(ApiError::Config(format!(
                        "API reported a conflict for {number} but no existing shipment was found"
                    ))),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Best-effort custom-reference assignment after a create. Returns a
    /// warning message on failure instead of an error.
    async fn assign_reference(&self, id: &str, reference: &str) -> Option<String> {
        let path = format!("{SHIPMENTS_PATH}/{id}");
        let body = json!({ "reference": reference });
        match self.request("PATCH", &path, &[], Some(&body)).await {
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(
                    shipment_id = id,
                    error = %err,
                    "Failed to assign custom reference",
                );
                Some(format!("failed to assign reference {reference:?}: {err}"))
            }
        }
    }

    // -- single-shipment reads ---------------------------------------------

    /// Fetch one shipment by ID. 404 is absence, not an error.
    pub async fn get_shipment(&self, id: &str, bypass_cache: bool) -> ApiResult<Option<Shipment>> {
        let key = keys::shipment(id);
        if !bypass_cache {
            if let Some(value) = self.cache.get(&key) {
                return Self::decode_shipment(value).map(Some);
            }
        }

        let path = format!("{SHIPMENTS_PATH}/{id}");
        match self.request("GET", &path, &[], None).await {
            Ok(raw) => {
                let shipment = map_shipment(Self::shipment_payload(&raw)?);
                self.cache_shipment(&shipment, None);
                Ok(Some(shipment))
            }
            Err(ApiError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Position-enriched re-fetch of a shipment, reduced to its
    /// coordinates. `None` when the shipment is unknown or carries no
    /// position. Cached under its own, narrower key.
    pub async fn get_vessel_position(&self, id: &str) -> ApiResult<Option<Coordinates>> {
        let key = keys::position(id);
        if let Some(value) = self.cache.get(&key) {
            return serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ApiError::Decode(e.to_string()));
        }

        let path = format!("{SHIPMENTS_PATH}/{id}");
        let query = [("mapPoint".to_string(), "true".to_string())];
        match self.request("GET", &path, &query, None).await {
            Ok(raw) => {
                let shipment = map_shipment(Self::shipment_payload(&raw)?);
                let Some(coordinates) = shipment.coordinates else {
                    return Ok(None);
                };
                if let Ok(value) = serde_json::to_value(coordinates) {
                    self.cache.set(&key, value, POSITION_TTL);
                }
                Ok(Some(coordinates))
            }
            Err(ApiError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Public, token-authenticated sharing link for a shipment.
    ///
    /// Reads the raw payload because the token is not part of the
    /// canonical schema, tolerating both envelope shapes (`tokens.map`
    /// nested, or a top-level `map_token`). A missing token is never
    /// cached — it may appear on a later poll.
    pub async fn get_sharing_link(&self, id: &str) -> ApiResult<Option<String>> {
        let key = keys::sharing_link(id);
        if let Some(value) = self.cache.get(&key) {
            return Ok(value.as_str().map(String::from));
        }

        let path = format!("{SHIPMENTS_PATH}/{id}");
        match self.request("GET", &path, &[], None).await {
            Ok(raw) => {
                let Some(body) = raw.body.as_ref() else {
                    return Ok(None);
                };
                let token = body
                    .get("tokens")
                    .and_then(|tokens| tokens.get("map"))
                    .or_else(|| body.get("map_token"))
                    .or_else(|| body.get("mapToken"))
                    .and_then(Value::as_str);
                match token {
                    Some(token) => {
                        let link = format!("{SHARING_LINK_BASE}/{id}?token={token}");
                        self.cache
                            .set(&key, Value::String(link.clone()), SHARING_LINK_TTL);
                        Ok(Some(link))
                    }
                    None => Ok(None),
                }
            }
            Err(ApiError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    // -- reference tracking ------------------------------------------------

    /// Track by Bill of Lading number.
    pub async fn track_by_bl(&self, bl_number: &str) -> ApiResult<Option<Shipment>> {
        self.track_by(ReferenceKind::BillOfLading, bl_number).await
    }

    /// Track by container number.
    pub async fn track_by_container(&self, container_number: &str) -> ApiResult<Option<Shipment>> {
        self.track_by(ReferenceKind::Container, container_number)
            .await
    }

    /// Track by booking number.
    pub async fn track_by_booking(&self, booking_number: &str) -> ApiResult<Option<Shipment>> {
        self.track_by(ReferenceKind::Booking, booking_number).await
    }

    async fn track_by(&self, kind: ReferenceKind, value: &str) -> ApiResult<Option<Shipment>> {
        let number = normalize_reference(value);
        warn_on_format_mismatch(kind, &number);

        let cache_key = keys::reference(kind, &number);
        if let Some(value) = self.cache.get(&cache_key) {
            return Self::decode_shipment(value).map(Some);
        }

        let query = vec![(kind.as_str().to_string(), number.clone())];
        let candidates = self.fetch_listing(&query).await?;
        if candidates.len() > 1 {
            tracing::debug!(
                kind = kind.as_str(),
                reference = %number,
                candidates = candidates.len(),
                "Ambiguous reference, selecting best match",
            );
        }
        let Some(chosen) = best_match(&candidates) else {
            return Ok(None);
        };
        let chosen = chosen.clone();
        self.cache_shipment(&chosen, Some(&cache_key));
        Ok(Some(chosen))
    }

    // -- listings & aggregates ---------------------------------------------

    /// List shipments with the given filters. 404 is an empty result.
    pub async fn list_shipments(&self, filters: &ListFilters) -> ApiResult<Vec<Shipment>> {
        let query = filters.to_query();
        let key = keys::listing(&query);
        let query = &query;
        let value = self
            .cache
            .get_or_fetch(&key, LIST_TTL, false, move || async move {
                let shipments = self.fetch_listing(query).await?;
                serde_json::to_value(shipments).map_err(|e| ApiError::Decode(e.to_string()))
            })
            .await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Free-text search by custom reference.
    pub async fn search(&self, reference: &str) -> ApiResult<Vec<Shipment>> {
        self.list_shipments(&ListFilters {
            reference: Some(reference.to_string()),
            ..Default::default()
        })
        .await
    }

    /// All shipments currently moving or awaiting departure.
    ///
    /// Two independent listing calls whose results are concatenated; a
    /// shipment cannot hold both statuses at once, so no dedup is needed.
    pub async fn get_active_shipments(&self) -> ApiResult<Vec<Shipment>> {
        let mut active = self
            .list_shipments(&ListFilters {
                status: Some(ShipmentStatus::EnRoute),
                ..Default::default()
            })
            .await?;
        let pending = self
            .list_shipments(&ListFilters {
                status: Some(ShipmentStatus::Pending),
                ..Default::default()
            })
            .await?;
        active.extend(pending);
        Ok(active)
    }

    /// En-route shipments with an ETA inside `[today, today + days]`,
    /// calendar-date granularity.
    pub async fn get_arriving_soon(&self, days: u32) -> ApiResult<Vec<Shipment>> {
        let today = chrono::Utc::now().date_naive();
        let until = today + chrono::Days::new(u64::from(days));
        self.list_shipments(&ListFilters {
            status: Some(ShipmentStatus::EnRoute),
            eta_from: Some(today.format("%Y-%m-%d").to_string()),
            eta_to: Some(until.format("%Y-%m-%d").to_string()),
            ..Default::default()
        })
        .await
    }

    // -- maintenance -------------------------------------------------------

    /// Current remaining-call budget.
    pub fn rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limit.status()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop the cached copy of one shipment. Reference-keyed entries are
    /// untouched and age out via their TTL.
    pub fn invalidate_shipment(&self, id: &str) -> bool {
        self.cache.invalidate(&keys::shipment(id))
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub fn disable_cache(&self) {
        self.cache.disable();
    }

    pub fn enable_cache(&self) {
        self.cache.enable();
    }
}

/// Advisory format check; a mismatch warns and proceeds.
fn warn_on_format_mismatch(kind: ReferenceKind, value: &str) {
    if !kind.matches_format(value) {
        tracing::warn!(
            kind = kind.as_str(),
            value,
            "Reference does not match the expected format",
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
