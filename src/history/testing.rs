//! In-memory diff log and issue rows for history tests.

use std::cell::RefCell;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::error::{ChartError, Result};
use crate::model::{Issue, Status};

use super::{Change, DiffLog, DiffRecord, IssueSource, NewDiff, Projection};

/// Fixed "now" so day arithmetic in tests is stable.
pub fn now() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
  now() - Duration::days(days)
}

#[derive(Default)]
pub struct MemoryStore {
  issues: RefCell<Vec<Issue>>,
  diffs: RefCell<Vec<DiffRecord>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_issue(&self, status: Status) -> u64 {
    let mut issues = self.issues.borrow_mut();
    let id = issues.len() as u64 + 1;
    issues.push(Issue {
      id,
      title: format!("issue {}", id),
      user_id: 1,
      project_id: 1,
      priority: 3,
      status,
      deadline: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
      watchers: Vec::new(),
      created_at: days_ago(30),
    });
    id
  }

  pub fn log_status(&self, issue_id: u64, old: Status, new: Status, at: DateTime<Utc>) {
    let projection = Projection {
      status: Some(Change { old, new }),
      ..Projection::default()
    };
    self.log_projection(issue_id, &serde_json::to_vec(&projection).unwrap(), at);
  }

  pub fn log_projection(&self, issue_id: u64, projection: &[u8], at: DateTime<Utc>) {
    self
      .append(&NewDiff {
        issue_id,
        raw_mutation: b"{}".to_vec(),
        projection: projection.to_vec(),
        created_at: at,
      })
      .unwrap();
  }
}

impl DiffLog for MemoryStore {
  fn append(&self, diff: &NewDiff) -> Result<u64> {
    let mut diffs = self.diffs.borrow_mut();
    let id = diffs.len() as u64 + 1;
    let seq = diffs.iter().filter(|d| d.issue_id == diff.issue_id).count() as u64 + 1;
    diffs.push(DiffRecord {
      id,
      issue_id: diff.issue_id,
      seq,
      raw_mutation: diff.raw_mutation.clone(),
      projection: diff.projection.clone(),
      created_at: diff.created_at,
    });
    Ok(id)
  }

  fn first_before(&self, issue_id: u64, at: DateTime<Utc>) -> Result<Option<DiffRecord>> {
    Ok(
      self
        .diffs
        .borrow()
        .iter()
        .filter(|d| d.issue_id == issue_id && d.created_at <= at)
        .max_by_key(|d| (d.created_at, d.seq))
        .cloned(),
    )
  }

  fn first_after(&self, issue_id: u64, at: DateTime<Utc>) -> Result<Option<DiffRecord>> {
    Ok(
      self
        .diffs
        .borrow()
        .iter()
        .filter(|d| d.issue_id == issue_id && d.created_at >= at)
        .min_by_key(|d| (d.created_at, d.seq))
        .cloned(),
    )
  }
}

impl IssueSource for MemoryStore {
  fn get_issue(&self, id: u64) -> Result<Issue> {
    self
      .issues
      .borrow()
      .iter()
      .find(|issue| issue.id == id)
      .cloned()
      .ok_or_else(|| ChartError::not_found("issue", id))
  }

  fn live_issue_ids(&self) -> Result<Vec<u64>> {
    Ok(self.issues.borrow().iter().map(|issue| issue.id).collect())
  }

  fn count_with_status(&self, status: Status) -> Result<u64> {
    Ok(
      self
        .issues
        .borrow()
        .iter()
        .filter(|issue| issue.status == status)
        .count() as u64,
    )
  }
}
