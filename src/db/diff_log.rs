//! SQLite implementation of the diff log.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::Result;
use crate::history::{DiffLog, DiffRecord, NewDiff};

use super::{format_timestamp, parse_timestamp};

const DIFF_COLUMNS: &str = "id, issue_id, seq, raw_mutation, projection, created_at";

fn diff_from_row(row: &Row<'_>) -> rusqlite::Result<DiffRecord> {
  let created_at: String = row.get(5)?;
  Ok(DiffRecord {
    id: row.get(0)?,
    issue_id: row.get(1)?,
    seq: row.get(2)?,
    raw_mutation: row.get(3)?,
    projection: row.get(4)?,
    created_at: parse_timestamp(5, &created_at)?,
  })
}

impl DiffLog for Connection {
  fn append(&self, diff: &NewDiff) -> Result<u64> {
    let last: Option<(u64, String)> = self
      .query_row(
        "SELECT seq, created_at FROM issue_diffs
         WHERE issue_id = ?
         ORDER BY seq DESC LIMIT 1",
        params![diff.issue_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    // Per-issue time order never regresses: a record stamped earlier than the
    // previous one is moved up to it and ordered after it by seq.
    let (seq, created_at) = match last {
      Some((seq, last_at)) => (seq + 1, diff.created_at.max(parse_timestamp(1, &last_at)?)),
      None => (1, diff.created_at),
    };

    let id: u64 = self.query_row(
      "INSERT INTO issue_diffs (issue_id, seq, raw_mutation, projection, created_at)
       VALUES (?, ?, ?, ?, ?)
       RETURNING id",
      params![
        diff.issue_id,
        seq,
        diff.raw_mutation,
        diff.projection,
        format_timestamp(created_at)
      ],
      |row| row.get(0),
    )?;

    debug!(diff_id = id, issue_id = diff.issue_id, seq, "appended issue diff");
    Ok(id)
  }

  fn first_before(&self, issue_id: u64, at: DateTime<Utc>) -> Result<Option<DiffRecord>> {
    let sql = format!(
      "SELECT {} FROM issue_diffs
       WHERE issue_id = ? AND created_at <= ?
       ORDER BY created_at DESC, seq DESC LIMIT 1",
      DIFF_COLUMNS
    );
    Ok(
      self
        .query_row(&sql, params![issue_id, format_timestamp(at)], diff_from_row)
        .optional()?,
    )
  }

  fn first_after(&self, issue_id: u64, at: DateTime<Utc>) -> Result<Option<DiffRecord>> {
    let sql = format!(
      "SELECT {} FROM issue_diffs
       WHERE issue_id = ? AND created_at >= ?
       ORDER BY created_at ASC, seq ASC LIMIT 1",
      DIFF_COLUMNS
    );
    Ok(
      self
        .query_row(&sql, params![issue_id, format_timestamp(at)], diff_from_row)
        .optional()?,
    )
  }
}
