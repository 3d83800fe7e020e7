//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// A query whose result can be cached under a content-derived key.
pub trait QueryKey {
  /// Canonical serialization of the query shape. Equal queries must produce
  /// equal bytes regardless of how they were built.
  fn canonical_bytes(&self) -> Result<Vec<u8>>;

  /// Human readable description stored alongside the entry.
  fn description(&self) -> String;

  /// Fixed-length cache key: hex SHA-256 of the canonical bytes.
  fn cache_hash(&self) -> Result<String> {
    Ok(fingerprint(&self.canonical_bytes()?))
  }
}

/// SHA256 hash for stable, fixed-length keys
pub fn fingerprint(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from freshly computed data.
  pub fn computed(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Computed,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Computed for this request
  Computed,
  /// Served from an unexpired cache entry
  Cache,
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Raw(&'static str);

  impl QueryKey for Raw {
    fn canonical_bytes(&self) -> Result<Vec<u8>> {
      Ok(self.0.as_bytes().to_vec())
    }

    fn description(&self) -> String {
      self.0.to_string()
    }
  }

  #[test]
  fn test_cache_hash_is_hex_sha256() {
    let hash = Raw("abc").cache_hash().unwrap();
    assert_eq!(
      hash,
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[test]
  fn test_distinct_queries_get_distinct_keys() {
    assert_ne!(Raw("a").cache_hash().unwrap(), Raw("b").cache_hash().unwrap());
    assert_eq!(Raw("a").cache_hash().unwrap(), Raw("a").cache_hash().unwrap());
  }
}
