//! Users, projects and issues.
//!
//! Rows are soft-deleted: a `deleted_at` stamp hides them from reads, counts and
//! charts while diff records that reference them stay in place.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ChartError, Result};
use crate::history::{compute_diff, DiffLog, IssueSource, NewDiff};
use crate::model::{
  check_priority, check_text_len, parse_deadline, Issue, IssueUpdate, MutationRequest, NewIssue,
  NewProject, NewUser, Project, Status, User,
};

use super::{format_timestamp, parse_timestamp, Database};

/// Rows inserted per transaction by batch imports.
pub const BATCH_SIZE: usize = 1000;

/// Issue columns that charts can group and filter by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueField {
  User,
  Project,
  Priority,
  Status,
}

impl IssueField {
  fn column(self) -> &'static str {
    match self {
      IssueField::User => "user_id",
      IssueField::Project => "project_id",
      IssueField::Priority => "priority",
      IssueField::Status => "status",
    }
  }
}

impl FromStr for IssueField {
  type Err = ChartError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "user" | "user_id" => Ok(IssueField::User),
      "project" | "project_id" => Ok(IssueField::Project),
      "priority" => Ok(IssueField::Priority),
      "status" => Ok(IssueField::Status),
      other => Err(ChartError::invalid(format!("unknown issue field '{}'", other))),
    }
  }
}

/// Row counts reported by `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatCounts {
  pub count_of_issues: u64,
  pub count_of_projects: u64,
  pub count_of_users: u64,
}

// ============================================================================
// Users
// ============================================================================

impl Database {
  pub fn create_user(&self, user: &NewUser) -> Result<u64> {
    let conn = self.conn()?;
    insert_user(&conn, user, Utc::now())
  }

  pub fn create_users(&self, users: &[NewUser]) -> Result<usize> {
    let mut conn = self.conn()?;
    insert_batch(&mut conn, "user", users, insert_user)
  }

  pub fn list_users(&self) -> Result<Vec<User>> {
    let conn = self.conn()?;
    let mut stmt = conn.prepare("SELECT id, email FROM users WHERE deleted_at IS NULL ORDER BY id")?;
    let users = stmt
      .query_map([], |row| {
        Ok(User {
          id: row.get(0)?,
          email: row.get(1)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
  }

  pub fn delete_user(&self, id: u64) -> Result<()> {
    let conn = self.conn()?;
    soft_delete(&conn, "users", "user", id)
  }
}

fn insert_user(conn: &Connection, user: &NewUser, now: DateTime<Utc>) -> Result<u64> {
  check_text_len("email", &user.email)?;
  let id = conn.query_row(
    "INSERT INTO users (email, created_at) VALUES (?, ?) RETURNING id",
    params![user.email, format_timestamp(now)],
    |row| row.get(0),
  )?;
  Ok(id)
}

// ============================================================================
// Projects
// ============================================================================

impl Database {
  pub fn create_project(&self, project: &NewProject) -> Result<u64> {
    let conn = self.conn()?;
    insert_project(&conn, project, Utc::now())
  }

  pub fn create_projects(&self, projects: &[NewProject]) -> Result<usize> {
    let mut conn = self.conn()?;
    insert_batch(&mut conn, "project", projects, insert_project)
  }

  pub fn list_projects(&self) -> Result<Vec<Project>> {
    let conn = self.conn()?;
    let mut stmt =
      conn.prepare("SELECT id, name, blocked FROM projects WHERE deleted_at IS NULL ORDER BY id")?;
    let projects = stmt
      .query_map([], |row| {
        Ok(Project {
          id: row.get(0)?,
          name: row.get(1)?,
          blocked: row.get(2)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
  }

  pub fn delete_project(&self, id: u64) -> Result<()> {
    let conn = self.conn()?;
    soft_delete(&conn, "projects", "project", id)
  }
}

fn insert_project(conn: &Connection, project: &NewProject, now: DateTime<Utc>) -> Result<u64> {
  check_text_len("name", &project.name)?;
  let id = conn.query_row(
    "INSERT INTO projects (name, blocked, created_at) VALUES (?, ?, ?) RETURNING id",
    params![project.name, project.blocked, format_timestamp(now)],
    |row| row.get(0),
  )?;
  Ok(id)
}

// ============================================================================
// Issues
// ============================================================================

impl Database {
  pub fn create_issue(&self, issue: &NewIssue) -> Result<u64> {
    let mut conn = self.conn()?;
    let tx = conn.transaction()?;
    let id = insert_issue(&tx, issue, Utc::now())?;
    tx.commit()?;
    Ok(id)
  }

  pub fn create_issues(&self, issues: &[NewIssue]) -> Result<usize> {
    let mut conn = self.conn()?;
    insert_batch(&mut conn, "issue", issues, insert_issue)
  }

  pub fn get_issue(&self, id: u64) -> Result<Issue> {
    self.conn()?.get_issue(id)
  }

  pub fn list_issues(&self) -> Result<Vec<Issue>> {
    let conn = self.conn()?;

    let mut watchers: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    {
      let mut stmt = conn.prepare(
        "SELECT w.issue_id, w.user_id FROM issue_watchers w
         INNER JOIN users u ON u.id = w.user_id AND u.deleted_at IS NULL
         ORDER BY w.issue_id, w.user_id",
      )?;
      let rows = stmt.query_map([], |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)))?;
      for row in rows {
        let (issue_id, user_id) = row?;
        watchers.entry(issue_id).or_default().push(user_id);
      }
    }

    let sql = format!(
      "SELECT {} FROM issues WHERE deleted_at IS NULL ORDER BY id",
      ISSUE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut issues = stmt
      .query_map([], issue_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    for issue in &mut issues {
      issue.watchers = watchers.remove(&issue.id).unwrap_or_default();
    }
    Ok(issues)
  }

  /// Apply an update and append its diff record in one transaction.
  ///
  /// Returns the id of the appended diff.
  pub fn update_issue(&self, id: u64, request: &MutationRequest) -> Result<u64> {
    self.update_issue_at(id, request, Utc::now())
  }

  /// [`Database::update_issue`] with an explicit timestamp for the row and diff.
  pub fn update_issue_at(
    &self,
    id: u64,
    request: &MutationRequest,
    at: DateTime<Utc>,
  ) -> Result<u64> {
    let mut conn = self.conn()?;
    let tx = conn.transaction()?;

    let old = tx.get_issue(id)?;
    apply_update(&tx, id, request.update(), at)?;
    let diff = compute_diff(&*tx, id, request, &old)?;
    let diff_id = tx.append(&NewDiff {
      issue_id: id,
      raw_mutation: diff.raw_mutation,
      projection: diff.projection,
      created_at: at,
    })?;

    tx.commit()?;
    info!(issue_id = id, diff_id, "updated issue");
    Ok(diff_id)
  }

  pub fn delete_issue(&self, id: u64) -> Result<()> {
    let conn = self.conn()?;
    soft_delete(&conn, "issues", "issue", id)
  }

  pub fn stat_counts(&self) -> Result<StatCounts> {
    let conn = self.conn()?;
    Ok(StatCounts {
      count_of_issues: count_live(&conn, "issues")?,
      count_of_projects: count_live(&conn, "projects")?,
      count_of_users: count_live(&conn, "users")?,
    })
  }

  /// Count live issues grouped by `group_by`, restricted by equality filters.
  pub fn count_issues_grouped(
    &self,
    group_by: IssueField,
    filters: &[(IssueField, String)],
  ) -> Result<BTreeMap<String, u64>> {
    let column = group_by.column();
    let mut sql = format!(
      "SELECT CAST({} AS TEXT), COUNT(id) FROM issues WHERE deleted_at IS NULL",
      column
    );
    for (field, _) in filters {
      sql.push_str(&format!(" AND {} = ?", field.column()));
    }
    sql.push_str(&format!(" GROUP BY {}", column));

    let conn = self.conn()?;
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
      .query_map(params_from_iter(filters.iter().map(|(_, value)| value)), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
      })?
      .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
    Ok(counts)
  }
}

/// Insert all `rows` or none: one transaction, one savepoint per
/// [`BATCH_SIZE`] chunk.
fn insert_batch<T>(
  conn: &mut Connection,
  entity: &'static str,
  rows: &[T],
  insert: fn(&Connection, &T, DateTime<Utc>) -> Result<u64>,
) -> Result<usize> {
  let now = Utc::now();
  let mut tx = conn.transaction()?;
  for chunk in rows.chunks(BATCH_SIZE) {
    let sp = tx.savepoint()?;
    for row in chunk {
      insert(&sp, row, now)?;
    }
    sp.commit()?;
    debug!(entity, rows = chunk.len(), "inserted batch chunk");
  }
  tx.commit()?;
  Ok(rows.len())
}

const ISSUE_COLUMNS: &str =
  "id, title, user_id, project_id, priority, status, deadline, created_at";

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
  let deadline: String = row.get(6)?;
  let created_at: String = row.get(7)?;
  Ok(Issue {
    id: row.get(0)?,
    title: row.get(1)?,
    user_id: row.get(2)?,
    project_id: row.get(3)?,
    priority: row.get(4)?,
    status: row.get(5)?,
    deadline: NaiveDate::parse_from_str(&deadline, "%Y-%m-%d")
      .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?,
    watchers: Vec::new(),
    created_at: parse_timestamp(7, &created_at)?,
  })
}

fn insert_issue(conn: &Connection, issue: &NewIssue, now: DateTime<Utc>) -> Result<u64> {
  check_text_len("title", &issue.title)?;
  check_priority(issue.priority)?;
  let deadline = parse_deadline(&issue.deadline)?;
  require_live(conn, "users", "user", issue.user_id)?;
  require_live(conn, "projects", "project", issue.project_id)?;

  let stamp = format_timestamp(now);
  let id: u64 = conn.query_row(
    "INSERT INTO issues (title, user_id, project_id, priority, status, deadline, created_at, updated_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)
     RETURNING id",
    params![
      issue.title,
      issue.user_id,
      issue.project_id,
      issue.priority,
      issue.status,
      deadline.format("%Y-%m-%d").to_string(),
      stamp,
      stamp
    ],
    |row| row.get(0),
  )?;

  replace_watchers(conn, id, &live_user_ids(conn, &issue.watchers)?)?;
  Ok(id)
}

fn apply_update(conn: &Connection, id: u64, update: &IssueUpdate, at: DateTime<Utc>) -> Result<()> {
  conn.execute(
    "UPDATE issues SET
       title = COALESCE(?, title),
       priority = COALESCE(?, priority),
       status = COALESCE(?, status),
       updated_at = ?
     WHERE id = ? AND deleted_at IS NULL",
    params![
      update.title,
      update.priority,
      update.status,
      format_timestamp(at),
      id
    ],
  )?;

  // Only a non-empty set of known users replaces the watcher list.
  if let Some(requested) = &update.watchers {
    let watchers = live_user_ids(conn, requested)?;
    if !watchers.is_empty() {
      conn.execute("DELETE FROM issue_watchers WHERE issue_id = ?", params![id])?;
      replace_watchers(conn, id, &watchers)?;
    }
  }
  Ok(())
}

fn replace_watchers(conn: &Connection, issue_id: u64, user_ids: &[u64]) -> Result<()> {
  let mut stmt =
    conn.prepare("INSERT OR IGNORE INTO issue_watchers (issue_id, user_id) VALUES (?, ?)")?;
  for user_id in user_ids {
    stmt.execute(params![issue_id, user_id])?;
  }
  Ok(())
}

/// Subset of `ids` naming live users, ascending and deduplicated.
fn live_user_ids(conn: &Connection, ids: &[u64]) -> Result<Vec<u64>> {
  let mut stmt = conn.prepare("SELECT 1 FROM users WHERE id = ? AND deleted_at IS NULL")?;
  let mut live = Vec::new();
  for &id in ids {
    if stmt.exists(params![id])? {
      live.push(id);
    }
  }
  live.sort_unstable();
  live.dedup();
  Ok(live)
}

fn require_live(conn: &Connection, table: &str, entity: &'static str, id: u64) -> Result<()> {
  let sql = format!("SELECT 1 FROM {} WHERE id = ? AND deleted_at IS NULL", table);
  if conn.query_row(&sql, params![id], |_| Ok(())).optional()?.is_none() {
    return Err(ChartError::not_found(entity, id));
  }
  Ok(())
}

fn soft_delete(conn: &Connection, table: &str, entity: &'static str, id: u64) -> Result<()> {
  let sql = format!(
    "UPDATE {} SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
    table
  );
  if conn.execute(&sql, params![format_timestamp(Utc::now()), id])? == 0 {
    return Err(ChartError::not_found(entity, id));
  }
  info!(entity, id, "deleted");
  Ok(())
}

fn count_live(conn: &Connection, table: &str) -> Result<u64> {
  let sql = format!("SELECT COUNT(*) FROM {} WHERE deleted_at IS NULL", table);
  Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

impl IssueSource for Connection {
  fn get_issue(&self, id: u64) -> Result<Issue> {
    let sql = format!(
      "SELECT {} FROM issues WHERE id = ? AND deleted_at IS NULL",
      ISSUE_COLUMNS
    );
    let mut issue = self
      .query_row(&sql, params![id], issue_from_row)
      .optional()?
      .ok_or_else(|| ChartError::not_found("issue", id))?;

    let mut stmt = self.prepare(
      "SELECT w.user_id FROM issue_watchers w
       INNER JOIN users u ON u.id = w.user_id AND u.deleted_at IS NULL
       WHERE w.issue_id = ?
       ORDER BY w.user_id",
    )?;
    issue.watchers = stmt
      .query_map(params![id], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(issue)
  }

  fn live_issue_ids(&self) -> Result<Vec<u64>> {
    let mut stmt = self.prepare("SELECT id FROM issues WHERE deleted_at IS NULL ORDER BY id")?;
    let ids = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
  }

  fn count_with_status(&self, status: Status) -> Result<u64> {
    Ok(self.query_row(
      "SELECT COUNT(*) FROM issues WHERE status = ? AND deleted_at IS NULL",
      params![status],
      |row| row.get(0),
    )?)
  }
}
