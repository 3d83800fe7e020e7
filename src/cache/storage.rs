//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result as EyreResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::db::{format_timestamp, parse_timestamp};
use crate::error::{ChartError, Result};

/// A single cached payload.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  /// Serialized value
  pub data: Vec<u8>,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Entries are whole-value overwrites addressed by key; there are no partial
/// updates.
pub trait CacheStorage: Send + Sync {
  /// Get the entry stored under `key`.
  fn get(&self, key: &str) -> Result<Option<CachedEntry>>;

  /// Store `data` under `key`, replacing any previous entry.
  fn put(&self, key: &str, description: &str, data: &[u8]) -> Result<()>;

  /// Remove entries written before `cutoff`. Returns how many were removed.
  fn evict_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<CachedEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _key: &str, _description: &str, _data: &[u8]) -> Result<()> {
    Ok(()) // Discard
  }

  fn evict_before(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
    Ok(0)
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open or create the cache database at `path`.
  pub fn open(path: &Path) -> EyreResult<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn).map_err(|e| eyre!("Failed to run cache migrations: {}", e))
  }

  /// Open a private in-memory cache.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default cache path.
  pub fn default_path() -> EyreResult<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("issue-charts").join("cache.db"))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chart_cache (
    query_hash TEXT PRIMARY KEY,
    query_description TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<CachedEntry>> {
    let conn = self.conn.lock().map_err(|_| ChartError::LockPoisoned)?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM chart_cache WHERE query_hash = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    match row {
      Some((data, cached_at)) => Ok(Some(CachedEntry {
        data,
        cached_at: parse_timestamp(1, &cached_at)?,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, key: &str, description: &str, data: &[u8]) -> Result<()> {
    let conn = self.conn.lock().map_err(|_| ChartError::LockPoisoned)?;

    conn.execute(
      "INSERT OR REPLACE INTO chart_cache (query_hash, query_description, data, cached_at)
       VALUES (?, ?, ?, ?)",
      params![key, description, data, format_timestamp(Utc::now())],
    )?;

    Ok(())
  }

  fn evict_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    let conn = self.conn.lock().map_err(|_| ChartError::LockPoisoned)?;

    let removed = conn.execute(
      "DELETE FROM chart_cache WHERE cached_at < ?",
      params![format_timestamp(cutoff)],
    )?;

    Ok(removed)
  }
}
