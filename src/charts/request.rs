use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cache::QueryKey;
use crate::error::{ChartError, Result};

/// Chart query as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRequest {
  #[serde(rename = "groupBy", default)]
  pub group_by: String,
  /// `"line"`, `"bar"`, or empty (treated as bar).
  #[serde(rename = "chartType", default)]
  pub chart_type: String,
  #[serde(default, alias = "Filters")]
  pub filters: Vec<Filter>,
}

/// Equality filter on an issue field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
  #[serde(rename = "type")]
  pub filter_type: String,
  pub value: String,
}

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
  /// Group-by count over current rows.
  Bar,
  /// Historical status series, served through the cache.
  Line,
}

impl ChartRequest {
  pub fn kind(&self) -> Result<ChartKind> {
    match self.chart_type.as_str() {
      "" | "bar" => Ok(ChartKind::Bar),
      "line" => Ok(ChartKind::Line),
      other => Err(ChartError::invalid(format!("unknown request: chart type '{}'", other))),
    }
  }

  /// Filters as a map: a repeated filter type keeps its last value.
  pub fn filter_map(&self) -> BTreeMap<&str, &str> {
    self
      .filters
      .iter()
      .map(|f| (f.filter_type.as_str(), f.value.as_str()))
      .collect()
  }

  /// The same query with filters deduplicated and sorted by type.
  pub fn normalized(&self) -> ChartRequest {
    ChartRequest {
      group_by: self.group_by.clone(),
      chart_type: self.chart_type.clone(),
      filters: self
        .filter_map()
        .into_iter()
        .map(|(filter_type, value)| Filter {
          filter_type: filter_type.to_string(),
          value: value.to_string(),
        })
        .collect(),
    }
  }
}

impl QueryKey for ChartRequest {
  /// JSON of the normalized request with object keys in sorted order.
  fn canonical_bytes(&self) -> Result<Vec<u8>> {
    let value = serde_json::to_value(self.normalized())?;
    Ok(serde_json::to_vec(&value)?)
  }

  fn description(&self) -> String {
    let filters: Vec<String> = self
      .filter_map()
      .into_iter()
      .map(|(t, v)| format!("{}={}", t, v))
      .collect();
    format!(
      "{} chart by '{}' [{}]",
      if self.chart_type.is_empty() { "bar" } else { &self.chart_type },
      self.group_by,
      filters.join(", ")
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn filter(t: &str, v: &str) -> Filter {
    Filter {
      filter_type: t.to_string(),
      value: v.to_string(),
    }
  }

  fn line(filters: Vec<Filter>) -> ChartRequest {
    ChartRequest {
      group_by: "status".to_string(),
      chart_type: "line".to_string(),
      filters,
    }
  }

  #[test]
  fn test_parse_client_json() {
    let request: ChartRequest = serde_json::from_value(json!({
      "groupBy": "status",
      "chartType": "line",
      "filters": [{ "type": "priority", "value": "2" }],
    }))
    .unwrap();

    assert_eq!(request, line(vec![filter("priority", "2")]));
    assert_eq!(request.kind().unwrap(), ChartKind::Line);
  }

  #[test]
  fn test_chart_kinds() {
    let mut request = ChartRequest::default();
    assert_eq!(request.kind().unwrap(), ChartKind::Bar);
    request.chart_type = "bar".to_string();
    assert_eq!(request.kind().unwrap(), ChartKind::Bar);
    request.chart_type = "pie".to_string();
    assert!(matches!(request.kind(), Err(ChartError::InvalidRequest(_))));
  }

  #[test]
  fn test_filter_order_does_not_change_key() {
    let a = line(vec![filter("status", "open"), filter("priority", "1")]);
    let b = line(vec![filter("priority", "1"), filter("status", "open")]);

    assert_eq!(a.cache_hash().unwrap(), b.cache_hash().unwrap());
  }

  #[test]
  fn test_repeated_filter_keeps_last_value() {
    let repeated = line(vec![filter("status", "open"), filter("status", "closed")]);
    let single = line(vec![filter("status", "closed")]);

    assert_eq!(repeated.normalized(), single);
    assert_eq!(repeated.cache_hash().unwrap(), single.cache_hash().unwrap());
  }

  #[test]
  fn test_different_shapes_get_different_keys() {
    let open = line(vec![filter("status", "open")]);
    let closed = line(vec![filter("status", "closed")]);
    let by_user = ChartRequest {
      group_by: "user".to_string(),
      ..open.clone()
    };

    assert_ne!(open.cache_hash().unwrap(), closed.cache_hash().unwrap());
    assert_ne!(open.cache_hash().unwrap(), by_user.cache_hash().unwrap());
  }

  #[test]
  fn test_canonical_bytes_sort_keys() {
    let bytes = line(vec![filter("status", "open")]).canonical_bytes().unwrap();
    assert_eq!(
      String::from_utf8(bytes).unwrap(),
      r#"{"chartType":"line","filters":[{"type":"status","value":"open"}],"groupBy":"status"}"#
    );
  }
}
