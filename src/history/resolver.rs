use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::Status;

use super::{DiffLog, IssueSource};

/// Status of `issue_id` as of `at`.
///
/// Precedence:
/// 1. the latest diff at or before `at` gives its new-side status;
/// 2. otherwise the earliest diff at or after `at` gives its old-side status,
///    the value that held up to that first change;
/// 3. otherwise the issue never changed status and its live value applies.
///
/// A selected diff without a status entry fails with `MalformedDiff`.
pub fn resolve_status<S>(store: &S, issue_id: u64, at: DateTime<Utc>) -> Result<Status>
where
  S: DiffLog + IssueSource + ?Sized,
{
  if let Some(before) = store.first_before(issue_id, at)? {
    return Ok(before.status_change()?.new);
  }

  if let Some(after) = store.first_after(issue_id, at)? {
    return Ok(after.status_change()?.old);
  }

  Ok(store.get_issue(issue_id)?.status)
}
