use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Issue, IssueUpdate, MutationRequest, Status};

use super::IssueSource;

/// Old and new value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change<T> {
  pub old: T,
  pub new: T,
}

/// Normalized before/after view of an update, limited to the requested fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<Change<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub priority: Option<Change<i64>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<Change<Status>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub watchers: Option<Change<Vec<u64>>>,
}

impl Projection {
  /// Project `old` and `new` onto the fields present in `update`.
  pub fn between(update: &IssueUpdate, old: &Issue, new: &Issue) -> Self {
    Self {
      title: update.title.as_ref().map(|_| Change {
        old: old.title.clone(),
        new: new.title.clone(),
      }),
      priority: update.priority.map(|_| Change {
        old: old.priority,
        new: new.priority,
      }),
      status: update.status.map(|_| Change {
        old: old.status,
        new: new.status,
      }),
      watchers: update.watchers.as_ref().map(|_| Change {
        old: canonical_watchers(&old.watchers),
        new: canonical_watchers(&new.watchers),
      }),
    }
  }
}

/// Serialized halves of a diff record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedDiff {
  pub raw_mutation: Vec<u8>,
  pub projection: Vec<u8>,
}

/// Build the diff for an update that has already been applied.
///
/// The new side is re-read from `store` rather than taken from the request, so
/// the projection records what was actually persisted.
pub fn compute_diff<S>(
  store: &S,
  issue_id: u64,
  request: &MutationRequest,
  old: &Issue,
) -> Result<ComputedDiff>
where
  S: IssueSource + ?Sized,
{
  let new = store.get_issue(issue_id)?;
  let projection = Projection::between(request.update(), old, &new);

  Ok(ComputedDiff {
    raw_mutation: request.raw_bytes()?,
    projection: serde_json::to_vec(&projection)?,
  })
}

fn canonical_watchers(watchers: &[u64]) -> Vec<u64> {
  let mut ids = watchers.to_vec();
  ids.sort_unstable();
  ids.dedup();
  ids
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ChartError;
  use chrono::{NaiveDate, TimeZone, Utc};
  use serde_json::json;

  struct SingleIssue(Issue);

  impl IssueSource for SingleIssue {
    fn get_issue(&self, id: u64) -> Result<Issue> {
      if id == self.0.id {
        Ok(self.0.clone())
      } else {
        Err(ChartError::not_found("issue", id))
      }
    }

    fn live_issue_ids(&self) -> Result<Vec<u64>> {
      Ok(vec![self.0.id])
    }

    fn count_with_status(&self, status: Status) -> Result<u64> {
      Ok(u64::from(self.0.status == status))
    }
  }

  fn issue(status: Status, watchers: Vec<u64>) -> Issue {
    Issue {
      id: 7,
      title: "Login broken".to_string(),
      user_id: 1,
      project_id: 1,
      priority: 3,
      status,
      deadline: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
      watchers,
      created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
  }

  #[test]
  fn test_projection_only_covers_requested_fields() {
    let old = issue(Status::Open, vec![]);
    let new = Issue {
      title: "Login fixed".to_string(),
      ..issue(Status::Closed, vec![])
    };
    let request = MutationRequest::parse(json!({ "status": "closed", "color": "red" })).unwrap();

    let diff = compute_diff(&SingleIssue(new), 7, &request, &old).unwrap();

    let projection: serde_json::Value = serde_json::from_slice(&diff.projection).unwrap();
    assert_eq!(projection, json!({ "status": { "old": "open", "new": "closed" } }));
    let raw: serde_json::Value = serde_json::from_slice(&diff.raw_mutation).unwrap();
    assert_eq!(raw, json!({ "status": "closed", "color": "red" }));
  }

  #[test]
  fn test_new_side_comes_from_persisted_row() {
    let old = issue(Status::Open, vec![]);
    // The store persisted in_progress even though closed was requested.
    let persisted = issue(Status::InProgress, vec![]);
    let request = MutationRequest::parse(json!({ "status": "closed" })).unwrap();

    let diff = compute_diff(&SingleIssue(persisted), 7, &request, &old).unwrap();

    let projection: Projection = serde_json::from_slice(&diff.projection).unwrap();
    assert_eq!(
      projection.status,
      Some(Change {
        old: Status::Open,
        new: Status::InProgress
      })
    );
  }

  #[test]
  fn test_watchers_are_canonically_ordered() {
    let old = issue(Status::Open, vec![5, 2]);
    let new = issue(Status::Open, vec![9, 1, 9]);
    let request = MutationRequest::parse(json!({ "watchers": [9, 1] })).unwrap();

    let diff = compute_diff(&SingleIssue(new), 7, &request, &old).unwrap();

    assert_eq!(
      diff.projection,
      br#"{"watchers":{"old":[2,5],"new":[1,9]}}"#.to_vec()
    );
  }

  #[test]
  fn test_identical_snapshots_give_identical_bytes() {
    let old = issue(Status::Open, vec![3, 1]);
    let new = issue(Status::Closed, vec![1, 3]);
    let request =
      MutationRequest::parse(json!({ "status": "closed", "title": "x", "watchers": [1, 3] }))
        .unwrap();
    let store = SingleIssue(new);

    let first = compute_diff(&store, 7, &request, &old).unwrap();
    let second = compute_diff(&store, 7, &request, &old).unwrap();

    assert_eq!(first, second);
  }

  #[test]
  fn test_missing_issue_is_not_found() {
    let old = issue(Status::Open, vec![]);
    let request = MutationRequest::parse(json!({ "status": "closed" })).unwrap();

    let err = compute_diff(&SingleIssue(old.clone()), 8, &request, &old).unwrap_err();

    assert!(err.is_not_found());
  }
}
