//! Cache-aside storage for expensive query results.
//!
//! This module provides a query-agnostic caching mechanism that:
//! - Derives fixed-length keys from a canonical serialization of the query
//! - Serves unexpired entries without recomputing
//! - Recomputes on miss and writes back on a best-effort basis
//! - Degrades to plain computation when the cache backend is unreachable

mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, DEFAULT_TTL_SECS};
#[cfg(test)]
pub use storage::CachedEntry;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::QueryKey;
