use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::cache::{CacheLayer, CacheStorage};
use crate::db::{Database, IssueField};
use crate::error::Result;
use crate::history::{build_series, IssueSource, Series};
use crate::model::{Project, User};

use super::request::{ChartKind, ChartRequest};

/// Labels attached to a bar chart grouped by user or project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fields {
  Users(Vec<User>),
  Projects(Vec<Project>),
}

/// Chart payload returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartResponse {
  Bar {
    #[serde(rename = "groupBy")]
    group_by: String,
    result: BTreeMap<String, u64>,
    fields: Option<Fields>,
  },
  Line {
    #[serde(rename = "groupBy")]
    group_by: String,
    result: Series,
  },
}

/// Answers chart requests: bar charts straight from current rows, line charts
/// through the cache-aside layer over the status series.
pub struct ChartService<S: CacheStorage> {
  db: Arc<Database>,
  cache: CacheLayer<S>,
}

impl<S: CacheStorage> ChartService<S> {
  pub fn new(db: Arc<Database>, cache: CacheLayer<S>) -> Self {
    Self { db, cache }
  }

  pub async fn chart(&self, request: &ChartRequest) -> Result<ChartResponse> {
    self.chart_at(request, Utc::now()).await
  }

  /// Answer `request` with `today` as the end of the line chart window.
  pub async fn chart_at(&self, request: &ChartRequest, today: DateTime<Utc>) -> Result<ChartResponse> {
    match request.kind()? {
      ChartKind::Bar => self.bar(request),
      ChartKind::Line => self.line(request, today).await,
    }
  }

  fn bar(&self, request: &ChartRequest) -> Result<ChartResponse> {
    let group_by: IssueField = request.group_by.parse()?;
    let filters = request
      .filter_map()
      .into_iter()
      .map(|(field, value)| Ok((field.parse()?, value.to_string())))
      .collect::<Result<Vec<(IssueField, String)>>>()?;

    let result = self.db.count_issues_grouped(group_by, &filters)?;
    let fields = match group_by {
      IssueField::User => Some(Fields::Users(self.db.list_users()?)),
      IssueField::Project => Some(Fields::Projects(self.db.list_projects()?)),
      IssueField::Priority | IssueField::Status => None,
    };

    Ok(ChartResponse::Bar {
      group_by: request.group_by.clone(),
      result,
      fields,
    })
  }

  async fn line(&self, request: &ChartRequest, today: DateTime<Utc>) -> Result<ChartResponse> {
    let query = request.normalized();
    let db = Arc::clone(&self.db);

    let series = self
      .cache
      .get_or_compute(&query, || async move {
        let conn = db.conn()?;
        let ids = conn.live_issue_ids()?;
        build_series(&*conn, &ids, today)
      })
      .await?;

    info!(
      source = ?series.source,
      cached_at = ?series.cached_at,
      group_by = %request.group_by,
      "line chart served"
    );
    Ok(ChartResponse::Line {
      group_by: request.group_by.clone(),
      result: series.data,
    })
  }
}
