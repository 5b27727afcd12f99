//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! Connector::execute
//!     → key.rs (fingerprint method + url + payload + headers)
//!     → CacheGateway::try_get (hit: return envelope, no transport call)
//!     → [transport call]
//!     → CacheGateway::put (best-effort write with TTL)
//!     → store.rs (pluggable CacheStore, MemoryCache by default)
//! ```
//!
//! # Design Decisions
//! - The cache is best-effort: store errors are logged, counted and swallowed,
//!   they never change the outcome of a request
//! - A gateway without a store is a valid, always-missing cache
//! - Counters are kept locally (`CacheStats`) and mirrored to `metrics`

pub mod key;
pub mod store;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::connector::envelope::RawResponse;
use crate::connector::request::Headers;
use crate::observability::metrics;

pub use key::CacheKey;
pub use store::{CacheError, CacheStore, MemoryCache};

/// Counters for cache activity.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    read_errors: AtomicU64,
    write_errors: AtomicU64,
}

/// Point-in-time copy of `CacheStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub read_errors: u64,
    pub write_errors: u64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }

    fn record(&self, counter: &AtomicU64, event: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_event(event);
    }
}

/// Front door to the optional cache store.
#[derive(Clone, Default)]
pub struct CacheGateway {
    store: Option<Arc<dyn CacheStore>>,
    stats: Arc<CacheStats>,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: Some(store),
            stats: Arc::default(),
        }
    }

    /// A gateway with no store: every lookup misses, every write is a no-op.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn fingerprint(
        &self,
        method: &Method,
        url: &str,
        data: &Map<String, Value>,
        headers: &Headers,
    ) -> CacheKey {
        CacheKey::fingerprint(method, url, data, headers)
    }

    /// Look up a cached response. Store errors count as a miss.
    pub fn try_get(&self, key: &CacheKey) -> Option<RawResponse> {
        let store = self.store.as_ref()?;

        let lookup = match store.has(key) {
            Ok(true) => store.get(key),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };

        match lookup {
            Ok(Some(response)) => {
                self.stats.record(&self.stats.hits, "hit");
                Some(response)
            }
            Ok(None) => {
                self.stats.record(&self.stats.misses, "miss");
                None
            }
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cache read failed, treating as miss");
                self.stats.record(&self.stats.read_errors, "read_error");
                None
            }
        }
    }

    /// Store a response. Never fails; errors are logged and counted.
    pub fn put(&self, key: &CacheKey, response: &RawResponse, ttl: Duration) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        match store.set(key, response.clone(), ttl) {
            Ok(()) => self.stats.record(&self.stats.writes, "write"),
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cache write failed, continuing without cache");
                self.stats.record(&self.stats.write_errors, "write_error");
            }
        }
    }

    /// Sweep expired entries out of the store.
    pub fn purge_expired(&self) -> usize {
        self.store
            .as_ref()
            .map_or(0, |store| store.purge_expired())
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

impl fmt::Debug for CacheGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheGateway")
            .field("enabled", &self.is_enabled())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
