//! Cache store capability and the in-memory implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

use crate::cache::key::CacheKey;
use crate::connector::envelope::RawResponse;

/// Errors a cache backend may report. The gateway swallows all of them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache rejected write for key {0}")]
    Rejected(String),
}

/// Key/value store with per-entry TTL.
pub trait CacheStore: Send + Sync {
    fn has(&self, key: &CacheKey) -> Result<bool, CacheError>;
    fn get(&self, key: &CacheKey) -> Result<Option<RawResponse>, CacheError>;
    fn set(&self, key: &CacheKey, value: RawResponse, ttl: Duration) -> Result<(), CacheError>;

    /// Drop expired entries; returns how many were removed. Stores that
    /// expire entries on their own keep the default.
    fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: RawResponse,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

/// A thread-safe in-memory store. Expired entries are evicted on access
/// and by `purge_expired`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn fresh(&self, key: &CacheKey) -> Option<RawResponse> {
        let fresh = self
            .inner
            .get(key)
            .map(|entry| entry.is_fresh().then(|| entry.response.clone()));

        match fresh {
            Some(Some(response)) => Some(response),
            Some(None) => {
                self.inner.remove(key);
                None
            }
            None => None,
        }
    }
}

impl CacheStore for MemoryCache {
    fn has(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.fresh(key).is_some())
    }

    fn get(&self, key: &CacheKey) -> Result<Option<RawResponse>, CacheError> {
        Ok(self.fresh(key))
    }

    fn set(&self, key: &CacheKey, value: RawResponse, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            self.inner.remove(key);
            return Ok(());
        }
        self.inner.insert(
            key.clone(),
            CacheEntry {
                response: value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.is_fresh());
        before.saturating_sub(self.inner.len())
    }
}
