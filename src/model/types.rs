use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ChartError;

/// Longest title, email or project name accepted by the store.
pub const MAX_TEXT_LEN: usize = 256;

/// Issue lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Status {
  Open,
  InProgress,
  Closed,
  Canceled,
}

impl Status {
  /// Fixed status set reported by charts, in the order live counts are taken.
  pub const ALL: [Status; 4] = [
    Status::Open,
    Status::Closed,
    Status::InProgress,
    Status::Canceled,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Status::Open => "open",
      Status::InProgress => "in_progress",
      Status::Closed => "closed",
      Status::Canceled => "canceled",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

impl From<UnknownStatus> for ChartError {
  fn from(err: UnknownStatus) -> Self {
    ChartError::InvalidRequest(err.to_string())
  }
}

impl FromStr for Status {
  type Err = UnknownStatus;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "open" => Ok(Status::Open),
      "in_progress" => Ok(Status::InProgress),
      "closed" => Ok(Status::Closed),
      "canceled" => Ok(Status::Canceled),
      other => Err(UnknownStatus(other.to_string())),
    }
  }
}

impl TryFrom<String> for Status {
  type Error = UnknownStatus;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Status> for &'static str {
  fn from(status: Status) -> Self {
    status.as_str()
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl ToSql for Status {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(ToSqlOutput::from(self.as_str()))
  }
}

impl FromSql for Status {
  fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
    value
      .as_str()?
      .parse()
      .map_err(|e| FromSqlError::Other(Box::new(e)))
  }
}

// ============================================================================
// Entities
// ============================================================================

/// A registered user. Users are referenced as issue owners and watchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
  pub id: u64,
  pub name: String,
  pub blocked: bool,
}

/// Current row state of an issue, watchers sorted by ascending user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
  pub id: u64,
  pub title: String,
  pub user_id: u64,
  pub project_id: u64,
  pub priority: i64,
  pub status: Status,
  pub deadline: NaiveDate,
  pub watchers: Vec<u64>,
  pub created_at: DateTime<Utc>,
}

// ============================================================================
// Creation payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
  pub name: String,
  #[serde(default)]
  pub blocked: bool,
}

/// Issue creation payload. `deadline` uses the `DD-MM-YYYY` format.
#[derive(Debug, Clone, Deserialize)]
pub struct NewIssue {
  pub title: String,
  pub user_id: u64,
  pub project_id: u64,
  pub priority: i64,
  pub status: Status,
  pub deadline: String,
  #[serde(default)]
  pub watchers: Vec<u64>,
}

/// Parse a `DD-MM-YYYY` deadline.
pub fn parse_deadline(s: &str) -> Result<NaiveDate, ChartError> {
  NaiveDate::parse_from_str(s, "%d-%m-%Y")
    .map_err(|e| ChartError::invalid(format!("invalid deadline '{}': {}", s, e)))
}

/// Reject text longer than the column allows.
pub fn check_text_len(field: &str, value: &str) -> Result<(), ChartError> {
  if value.chars().count() > MAX_TEXT_LEN {
    return Err(ChartError::invalid(format!(
      "{} is longer than {} characters",
      field, MAX_TEXT_LEN
    )));
  }
  Ok(())
}

/// Reject priorities outside 1..=5.
pub fn check_priority(priority: i64) -> Result<(), ChartError> {
  if !(1..=5).contains(&priority) {
    return Err(ChartError::invalid(format!(
      "priority must be between 1 and 5, got {}",
      priority
    )));
  }
  Ok(())
}
