//! Point-in-time reconstruction of issue status from the diff log.
//!
//! Every issue update appends one immutable diff record holding the raw
//! submitted payload and an old/new projection of the recognized fields.
//! The resolver walks those records to answer "what was the status of issue X
//! at instant D", and the series builder aggregates that over a fixed window.

mod diff;
mod resolver;
mod series;
#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};

use crate::error::{ChartError, Result};
use crate::model::{Issue, Status};

pub use diff::{compute_diff, Change, Projection};
pub use resolver::resolve_status;
pub use series::{build_series, Series};
#[cfg(test)]
pub use series::WINDOW_DAYS;

/// A persisted diff record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRecord {
  pub id: u64,
  pub issue_id: u64,
  /// Per-issue append sequence, starting at 1.
  pub seq: u64,
  pub raw_mutation: Vec<u8>,
  pub projection: Vec<u8>,
  pub created_at: DateTime<Utc>,
}

impl DiffRecord {
  /// Decode the stored projection.
  pub fn projection(&self) -> Result<Projection> {
    serde_json::from_slice(&self.projection).map_err(|e| ChartError::MalformedDiff {
      diff_id: self.id,
      reason: e.to_string(),
    })
  }

  /// The status transition recorded by this diff.
  pub fn status_change(&self) -> Result<Change<Status>> {
    self
      .projection()?
      .status
      .ok_or_else(|| ChartError::MalformedDiff {
        diff_id: self.id,
        reason: "projection has no status entry".to_string(),
      })
  }
}

/// A diff record ready to be appended.
#[derive(Debug, Clone)]
pub struct NewDiff {
  pub issue_id: u64,
  pub raw_mutation: Vec<u8>,
  pub projection: Vec<u8>,
  pub created_at: DateTime<Utc>,
}

/// Append-only log of issue diffs.
pub trait DiffLog {
  /// Insert a record and return its id. Records of one issue keep insertion
  /// order equal to time order.
  fn append(&self, diff: &NewDiff) -> Result<u64>;

  /// The latest diff of `issue_id` created at or before `at`.
  fn first_before(&self, issue_id: u64, at: DateTime<Utc>) -> Result<Option<DiffRecord>>;

  /// The earliest diff of `issue_id` created at or after `at`.
  fn first_after(&self, issue_id: u64, at: DateTime<Utc>) -> Result<Option<DiffRecord>>;
}

/// Read access to current (live) issue rows.
pub trait IssueSource {
  /// Current row of a live issue, or `ChartError::NotFound`.
  fn get_issue(&self, id: u64) -> Result<Issue>;

  /// Ids of all live issues in ascending order.
  fn live_issue_ids(&self) -> Result<Vec<u64>>;

  /// Number of live issues currently in `status`.
  fn count_with_status(&self, status: Status) -> Result<u64>;
}
