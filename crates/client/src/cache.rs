//! TTL cache facade.
//!
//! An in-memory keyed store with per-entry expiry, hit/miss accounting,
//! and a global enable/disable toggle. Values are stored as
//! [`serde_json::Value`] so one cache serves shipments, coordinate
//! snapshots, listings, and sharing links alike.
//!
//! Keys are built by the helpers in [`keys`]: operation name plus
//! normalized parameters, so that two spellings of the same reference
//! number address the same entry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::ApiError;

/// One cached value with its expiry deadline.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Counters and flags reported by [`TtlCache::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub enabled: bool,
}

/// In-memory TTL cache.
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    enabled: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(true),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Look up an unexpired entry. Expired entries are removed on read.
    ///
    /// Returns `None` without touching counters while the cache is
    /// disabled.
    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled.load(Ordering::Relaxed) {
            return None;
        }

        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "Cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value under `key` for `ttl`. No-op while disabled.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        self.lock().insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Return the cached value or invoke `producer` and cache its result.
    ///
    /// With `bypass` set, a previously cached value is never returned —
    /// the producer always runs and its result replaces whatever was
    /// stored.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        bypass: bool,
        producer: F,
    ) -> Result<Value, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ApiError>>,
    {
        if !bypass {
            if let Some(value) = self.get(key) {
                return Ok(value);
            }
        }

        let value = producer().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove one entry. Returns whether an entry existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop all entries, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Re-enable lookups and writes.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable all subsequent lookups and writes. Existing entries are
    /// kept and become visible again after [`enable`](Self::enable).
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            enabled: self.enabled.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Key construction
// ---------------------------------------------------------------------------

/// Deterministic cache keys: `ocean:` namespace, operation name, and
/// normalized parameters.
pub mod keys {
    use oceantrack_core::reference::ReferenceKind;

    pub fn shipment(id: &str) -> String {
        format!("ocean:shipment:{id}")
    }

    pub fn reference(kind: ReferenceKind, normalized_value: &str) -> String {
        format!("ocean:track:{}:{}", kind.as_str(), normalized_value)
    }

    /// Listing key from already-normalized query pairs. Pairs are sorted
    /// so that filter order never produces distinct keys.
    pub fn listing(query: &[(String, String)]) -> String {
        let mut pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        format!("ocean:list:{}", pairs.join("&"))
    }

    pub fn position(id: &str) -> String {
        format!("ocean:position:{id}")
    }

    pub fn sharing_link(id: &str) -> String {
        format!("ocean:sharing-link:{id}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
