use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::Status;

use super::{resolve_status, DiffLog, IssueSource};

/// Number of daily buckets in a series, today included.
pub const WINDOW_DAYS: usize = 10;

/// Per-day status counts, keyed by UTC calendar date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series(BTreeMap<NaiveDate, BTreeMap<Status, u64>>);

impl Series {
  #[cfg(test)]
  pub fn buckets(&self) -> &BTreeMap<NaiveDate, BTreeMap<Status, u64>> {
    &self.0
  }

  /// Count for `status` on `date`, zero when absent.
  #[cfg(test)]
  pub fn count(&self, date: NaiveDate, status: Status) -> u64 {
    self
      .0
      .get(&date)
      .and_then(|bucket| bucket.get(&status))
      .copied()
      .unwrap_or(0)
  }

  fn bucket(&mut self, date: NaiveDate) -> &mut BTreeMap<Status, u64> {
    self
      .0
      .entry(date)
      .or_insert_with(|| Status::ALL.iter().map(|s| (*s, 0)).collect())
  }
}

/// Resolution instants, oldest first: `today - 9 days` through `today`.
pub fn window(today: DateTime<Utc>) -> Vec<DateTime<Utc>> {
  (0..WINDOW_DAYS)
    .rev()
    .map(|back| today - Duration::days(back as i64))
    .collect()
}

/// Status counts over the window ending at `today`.
///
/// The nine past buckets are reconstructed per issue from the diff log; the
/// last bucket is taken from live row counts.
pub fn build_series<S>(store: &S, issue_ids: &[u64], today: DateTime<Utc>) -> Result<Series>
where
  S: DiffLog + IssueSource + ?Sized,
{
  let instants = window(today);
  let (past, current) = instants.split_at(WINDOW_DAYS - 1);
  let mut series = Series::default();

  for at in past {
    let bucket = series.bucket(at.date_naive());
    for &issue_id in issue_ids {
      let status = resolve_status(store, issue_id, *at)?;
      *bucket.entry(status).or_insert(0) += 1;
    }
  }

  let bucket = series.bucket(current[0].date_naive());
  for status in Status::ALL {
    bucket.insert(status, store.count_with_status(status)?);
  }

  debug!(
    issues = issue_ids.len(),
    buckets = series.0.len(),
    "built status series"
  );

  Ok(series)
}
