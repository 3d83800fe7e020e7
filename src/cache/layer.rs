//! Cache-aside layer in front of expensive computations.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, QueryKey};
use crate::error::Result;

/// Default lifetime of a cache entry.
pub const DEFAULT_TTL_SECS: i64 = 600;

/// Cache layer that serves computed results from storage while they are fresh.
///
/// Entries are never invalidated by writes elsewhere; staleness is bounded only
/// by the TTL. Concurrent misses on one key may both compute, which costs work
/// but not correctness since the computation is idempotent.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long a cached entry is served
  ttl: Duration,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      ttl: Duration::seconds(DEFAULT_TTL_SECS),
    }
  }

  /// Set the entry lifetime.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Check if an entry written at `cached_at` has outlived the TTL.
  fn is_expired(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at >= self.ttl
  }

  /// Return the cached value for `key`, or compute and store it.
  ///
  /// 1. Check cache - if present and unexpired, decode and return it
  /// 2. On miss, expiry or a failed read, run `compute`
  /// 3. Write the result back on a best-effort basis
  ///
  /// Errors from `compute` and undecodable cached payloads fail the call; cache
  /// backend failures never do.
  pub async fn get_or_compute<K, T, F, Fut>(&self, key: &K, compute: F) -> Result<CacheResult<T>>
  where
    K: QueryKey,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let hash = key.cache_hash()?;

    match self.storage.get(&hash) {
      Ok(Some(entry)) if !self.is_expired(entry.cached_at) => {
        let data = serde_json::from_slice(&entry.data)?;
        info!(key = %hash, "cache hit");
        return Ok(CacheResult::from_cache(data, entry.cached_at));
      }
      Ok(Some(entry)) => debug!(key = %hash, cached_at = %entry.cached_at, "cache entry expired"),
      Ok(None) => debug!(key = %hash, "cache miss"),
      Err(e) => warn!(key = %hash, error = %e, "cache read failed, computing"),
    }

    let data = compute().await?;
    if best_effort_cache_write(self.storage.as_ref(), &hash, &key.description(), &data) {
      self.evict_expired();
    }
    Ok(CacheResult::computed(data))
  }

  /// Drop entries that have outlived the TTL, logging any failure.
  fn evict_expired(&self) {
    match self.storage.evict_before(Utc::now() - self.ttl) {
      Ok(0) => {}
      Ok(removed) => debug!(removed, "evicted expired cache entries"),
      Err(e) => warn!(error = %e, "cache eviction failed"),
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      ttl: self.ttl,
    }
  }
}

/// Serialize `value` and store it under `key`, logging and swallowing any
/// failure. Returns whether the entry was written.
pub fn best_effort_cache_write<S, T>(storage: &S, key: &str, description: &str, value: &T) -> bool
where
  S: CacheStorage + ?Sized,
  T: Serialize,
{
  let data = match serde_json::to_vec(value) {
    Ok(data) => data,
    Err(e) => {
      warn!(key, error = %e, "failed to encode cache entry");
      return false;
    }
  };

  match storage.put(key, description, &data) {
    Ok(()) => {
      debug!(key, bytes = data.len(), "cache entry written");
      true
    }
    Err(e) => {
      warn!(key, error = %e, "cache write failed");
      false
    }
  }
}
