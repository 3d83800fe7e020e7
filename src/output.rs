//! The `{message, data}` envelope every command prints.

use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
  pub message: String,
  pub data: Value,
}

impl Response {
  /// Successful response carrying `data` and no message.
  pub fn data<T: Serialize>(data: &T) -> serde_json::Result<Self> {
    Ok(Self {
      message: String::new(),
      data: serde_json::to_value(data)?,
    })
  }

  /// Successful response carrying only a message.
  pub fn message(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      data: Value::Null,
    }
  }

  /// Attach `data` to a message response.
  pub fn with_data<T: Serialize>(self, data: &T) -> serde_json::Result<Self> {
    Ok(Self {
      data: serde_json::to_value(data)?,
      ..self
    })
  }

  /// Error response: the error text as message and null data.
  pub fn failure(err: &dyn Display) -> Self {
    Self::message(err.to_string())
  }

  pub fn render(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ChartError;
  use serde_json::json;

  #[test]
  fn test_data_response_has_empty_message() {
    let response = Response::data(&json!({ "id": 4 })).unwrap();
    assert_eq!(
      serde_json::to_value(&response).unwrap(),
      json!({ "message": "", "data": { "id": 4 } })
    );
  }

  #[test]
  fn test_failure_has_null_data() {
    let err = ChartError::not_found("issue", 9);
    let response = Response::failure(&err);
    assert_eq!(response.data, Value::Null);
    assert!(response.message.contains("issue"));
    assert!(response.render().unwrap().contains("\"data\": null"));
  }

  #[test]
  fn test_message_with_data() {
    let response = Response::message("Users inserted successfully")
      .with_data(&json!({ "inserted": 2 }))
      .unwrap();
    assert_eq!(response.message, "Users inserted successfully");
    assert_eq!(response.data["inserted"], 2);
  }
}
