//! Error type shared by the store, history and chart modules.

use thiserror::Error;

/// Failures surfaced by the issue store, the history subsystem and the chart cache.
#[derive(Debug, Error)]
pub enum ChartError {
  /// A row (issue, user, project) does not exist or was deleted.
  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: u64 },

  /// A diff record exists but its projection cannot answer the query.
  #[error("diff {diff_id} is malformed: {reason}")]
  MalformedDiff { diff_id: u64, reason: String },

  /// (De)serialization of a mutation payload, projection or cached series failed.
  #[error("encoding error: {0}")]
  Encoding(#[from] serde_json::Error),

  /// Underlying SQLite failure (entity store or cache store).
  #[error("store error: {0}")]
  Store(#[from] rusqlite::Error),

  /// The request was rejected at the boundary.
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("connection lock poisoned")]
  LockPoisoned,
}

impl ChartError {
  pub fn not_found(entity: &'static str, id: u64) -> Self {
    Self::NotFound { entity, id }
  }

  pub fn invalid(reason: impl Into<String>) -> Self {
    Self::InvalidRequest(reason.into())
  }

  /// True for a missing or deleted row.
  #[cfg(test)]
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound { .. })
  }
}

pub type Result<T, E = ChartError> = std::result::Result<T, E>;
