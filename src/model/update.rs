//! Issue update payloads.
//!
//! Callers submit an arbitrary JSON object. Known keys are validated into an
//! [`IssueUpdate`] at the boundary while the object itself is kept verbatim so
//! the diff log can record exactly what was submitted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ChartError, Result};

use super::types::{check_priority, check_text_len, Status};

/// Typed view of the fields an update may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub priority: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<Status>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub watchers: Option<Vec<u64>>,
}

/// A validated update request: the raw submitted object plus its typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
  raw: Map<String, Value>,
  update: IssueUpdate,
}

impl MutationRequest {
  /// Validate a submitted JSON object.
  ///
  /// Unknown keys are kept in the raw object and otherwise ignored. A known key
  /// with a value of the wrong shape rejects the whole request.
  pub fn parse(payload: Value) -> Result<Self> {
    let Value::Object(raw) = payload else {
      return Err(ChartError::invalid("update payload must be a JSON object"));
    };

    let update = IssueUpdate {
      title: field(&raw, "title")?,
      priority: field(&raw, "priority")?,
      status: field(&raw, "status")?,
      watchers: field(&raw, "watchers")?,
    };

    if let Some(title) = &update.title {
      check_text_len("title", title)?;
    }
    if let Some(priority) = update.priority {
      check_priority(priority)?;
    }

    Ok(Self { raw, update })
  }

  /// The object exactly as submitted.
  #[cfg(test)]
  pub fn raw(&self) -> &Map<String, Value> {
    &self.raw
  }

  pub fn update(&self) -> &IssueUpdate {
    &self.update
  }

  /// Serialized raw object, as stored in the diff log.
  pub fn raw_bytes(&self) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&self.raw)?)
  }
}

impl TryFrom<IssueUpdate> for MutationRequest {
  type Error = ChartError;

  fn try_from(update: IssueUpdate) -> Result<Self> {
    Self::parse(serde_json::to_value(update)?)
  }
}

fn field<T: DeserializeOwned>(raw: &Map<String, Value>, key: &str) -> Result<Option<T>> {
  raw
    .get(key)
    .map(|value| {
      serde_json::from_value(value.clone())
        .map_err(|e| ChartError::invalid(format!("field '{}': {}", key, e)))
    })
    .transpose()
}
