//! Remaining-call budget tracking.
//!
//! The API reports its rate limit through `X-RateLimit-*` response
//! headers, but not on every endpoint and not reliably. The tracker
//! reconciles those server numbers with a local sliding window of calls
//! made in the last 60 seconds: fresh server numbers win, otherwise the
//! budget is estimated from the local window against an assumed limit.
//!
//! The record is persisted through an injected [`RateLimitStore`] so that
//! short-lived processes keep a view of the budget. Persistence is
//! best-effort in both directions — a failing store degrades tracking, it
//! never fails a caller. Concurrent processes can race on the same store;
//! the counter is advisory, not a gate.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use oceantrack_core::types::Timestamp;

/// Sliding window for both server-number freshness and local call counting.
pub const WINDOW_SECS: i64 = 60;

/// Limit assumed when the server has not reported one.
pub const ASSUMED_LIMIT: u32 = 100;

/// Remaining-calls threshold below which a warning is raised.
pub const WARN_THRESHOLD: u32 = 20;

/// Reset values above this are absolute epoch seconds rather than
/// seconds-from-now.
const ABSOLUTE_EPOCH_THRESHOLD: f64 = 1e10;

// ---------------------------------------------------------------------------
// Record & store
// ---------------------------------------------------------------------------

/// Persisted rate-limit state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitRecord {
    /// Server-reported remaining calls, when known.
    pub remaining: Option<u32>,
    /// Server-reported limit, when known.
    pub limit: Option<u32>,
    /// When the budget resets, when known.
    pub reset_at: Option<Timestamp>,
    /// Last time a server header updated this record.
    pub updated_at: Option<Timestamp>,
    /// Timestamps of recent local calls (fallback estimate source).
    pub local_calls: Vec<Timestamp>,
}

/// Persistence seam for the rate-limit record.
///
/// Implementations must never panic; I/O errors are reported so the
/// tracker can log and move on.
pub trait RateLimitStore: Send + Sync {
    fn load(&self) -> std::io::Result<Option<RateLimitRecord>>;
    fn save(&self, record: &RateLimitRecord) -> std::io::Result<()>;
}

/// JSON-file-backed store.
pub struct FileRateLimitStore {
    path: PathBuf,
}

impl FileRateLimitStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RateLimitStore for FileRateLimitStore {
    fn load(&self) -> std::io::Result<Option<RateLimitRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        let record = serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(record))
    }

    fn save(&self, record: &RateLimitRecord) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, text)
    }
}

/// Process-local store with no persistence across restarts.
///
/// Useful when the embedding application manages its own state directory
/// policy, and as the store of choice in tests.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    record: Mutex<Option<RateLimitRecord>>,
}

impl RateLimitStore for MemoryRateLimitStore {
    fn load(&self) -> std::io::Result<Option<RateLimitRecord>> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, record: &RateLimitRecord) -> std::io::Result<()> {
        *self
            .record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Snapshot of the current call budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: Option<Timestamp>,
    /// True when the numbers come from the local sliding window rather
    /// than fresh server headers.
    pub estimated: bool,
    /// Populated when `remaining` drops below [`WARN_THRESHOLD`].
    pub warning: Option<String>,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Reconciles server-reported rate-limit headers with a local call log.
pub struct RateLimitTracker {
    record: Mutex<RateLimitRecord>,
    store: Box<dyn RateLimitStore>,
}

impl RateLimitTracker {
    /// Create a tracker, seeding state from the store when possible.
    pub fn new(store: Box<dyn RateLimitStore>) -> Self {
        let record = match store.load() {
            Ok(Some(record)) => record,
            Ok(None) => RateLimitRecord::default(),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to load rate-limit record, starting fresh");
                RateLimitRecord::default()
            }
        };
        Self {
            record: Mutex::new(record),
            store,
        }
    }

    /// Update state from the headers of one API response.
    ///
    /// Recognized headers (names lower-cased by the transport):
    /// `x-ratelimit-remaining`, `x-ratelimit-limit`, and
    /// `x-ratelimit-reset` / `retry-after` for the reset time. A reset
    /// value above 1e10 is an absolute epoch-seconds timestamp, otherwise
    /// seconds-from-now. The current time is always appended to the local
    /// call log, pruned to the last 60 seconds.
    pub fn record_response(&self, headers: &HashMap<String, String>) {
        let now = chrono::Utc::now();
        let mut record = match self.record.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let remaining = parse_u32(headers.get("x-ratelimit-remaining"));
        let limit = parse_u32(headers.get("x-ratelimit-limit"));
        let reset = headers
            .get("x-ratelimit-reset")
            .or_else(|| headers.get("retry-after"))
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|v| parse_reset(v, now));

        if remaining.is_some() || limit.is_some() || reset.is_some() {
            record.updated_at = Some(now);
        }
        if remaining.is_some() {
            record.remaining = remaining;
        }
        if limit.is_some() {
            record.limit = limit;
        }
        if let Some(reset_at) = reset {
            record.reset_at = Some(reset_at);
        }

        record.local_calls.push(now);
        let cutoff = now - chrono::Duration::seconds(WINDOW_SECS);
        record.local_calls.retain(|t| *t > cutoff);

        if let Err(e) = self.store.save(&record) {
            tracing::debug!(error = %e, "Failed to persist rate-limit record");
        }
    }

    /// Report the current budget.
    ///
    /// Uses server numbers when they were updated within the last 60
    /// seconds and `remaining` is known (limit defaulting to
    /// [`ASSUMED_LIMIT`]); otherwise estimates `max(0, 100 - local calls
    /// in window)` and flags the result as estimated. Either path warns
    /// when remaining drops below [`WARN_THRESHOLD`].
    pub fn status(&self) -> RateLimitStatus {
        let now = chrono::Utc::now();
        let record = match self.record.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let fresh = record
            .updated_at
            .is_some_and(|t| now - t < chrono::Duration::seconds(WINDOW_SECS));

        if fresh {
            if let Some(remaining) = record.remaining {
                let limit = record.limit.unwrap_or(ASSUMED_LIMIT);
                return RateLimitStatus {
                    remaining,
                    limit,
                    reset_at: record.reset_at,
                    estimated: false,
                    warning: (remaining < WARN_THRESHOLD)
                        .then(|| format!("only {remaining} API calls remaining")),
                };
            }
        }

        let cutoff = now - chrono::Duration::seconds(WINDOW_SECS);
        let calls_in_window = record.local_calls.iter().filter(|t| **t > cutoff).count() as u32;
        let remaining = ASSUMED_LIMIT.saturating_sub(calls_in_window);
        RateLimitStatus {
            remaining,
            limit: ASSUMED_LIMIT,
            reset_at: record.reset_at,
            estimated: true,
            warning: (remaining < WARN_THRESHOLD)
                .then(|| format!("an estimated {remaining} API calls remaining")),
        }
    }
}

fn parse_u32(value: Option<&String>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Interpret a numeric reset value as either an absolute epoch timestamp
/// or a seconds-from-now delta.
fn parse_reset(value: f64, now: Timestamp) -> Timestamp {
    if value > ABSOLUTE_EPOCH_THRESHOLD {
        chrono::DateTime::from_timestamp(value as i64, 0).unwrap_or(now)
    } else {
        now + chrono::Duration::seconds(value as i64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
