//! Subcommands and their dispatch onto the store and chart service.

use clap::{Args, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::cache::CacheStorage;
use crate::charts::{ChartRequest, ChartService, Filter};
use crate::db::Database;
use crate::model::{MutationRequest, NewIssue, NewProject, NewUser};
use crate::output::Response;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Manage users
  #[command(subcommand)]
  User(UserCommand),

  /// Manage projects
  #[command(subcommand)]
  Project(ProjectCommand),

  /// Manage issues
  #[command(subcommand)]
  Issue(IssueCommand),

  /// Count live issues, projects and users
  Stat,

  /// Build a bar chart of current issues or a line chart of status history
  Chart(ChartArgs),
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
  /// Add one user
  Add { email: String },
  /// Add users from a JSON array file ("-" reads stdin)
  Batch { file: PathBuf },
  /// List live users
  List,
  /// Delete a user
  Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
  /// Add one project
  Add {
    name: String,
    #[arg(long)]
    blocked: bool,
  },
  /// Add projects from a JSON array file ("-" reads stdin)
  Batch { file: PathBuf },
  /// List live projects
  List,
  /// Delete a project
  Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum IssueCommand {
  /// Add one issue given as a JSON object
  Add { issue: String },
  /// Add issues from a JSON array file ("-" reads stdin)
  Batch { file: PathBuf },
  /// List live issues with their watchers
  List,
  /// Show one live issue with its watchers
  Get { id: u64 },
  /// Apply a JSON object of field changes and record the diff
  Update { id: u64, changes: String },
  /// Delete an issue
  Delete { id: u64 },
}

#[derive(Args, Debug, Default)]
pub struct ChartArgs {
  /// Whole request as JSON: {"groupBy", "chartType", "filters": [{"type", "value"}]}
  #[arg(conflicts_with_all = ["group_by", "chart_type", "filter"])]
  pub request: Option<String>,

  /// Issue field to group by: user, project, priority or status
  #[arg(long)]
  pub group_by: Option<String>,

  /// Chart type: bar (default) or line
  #[arg(long = "type")]
  pub chart_type: Option<String>,

  /// Equality filter as type=value, repeatable
  #[arg(long)]
  pub filter: Vec<String>,
}

impl ChartArgs {
  pub fn to_request(&self) -> Result<ChartRequest> {
    if let Some(raw) = &self.request {
      return serde_json::from_str(raw).map_err(|e| eyre!("invalid JSON payload: {}", e));
    }

    let filters = self
      .filter
      .iter()
      .map(|f| {
        let (filter_type, value) = f
          .split_once('=')
          .ok_or_else(|| eyre!("invalid filter '{}', expected type=value", f))?;
        Ok(Filter {
          filter_type: filter_type.to_string(),
          value: value.to_string(),
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(ChartRequest {
      group_by: self.group_by.clone().unwrap_or_default(),
      chart_type: self.chart_type.clone().unwrap_or_default(),
      filters,
    })
  }
}

/// Run every command except `chart`, which needs a cache backend.
pub fn execute(command: Command, db: &Database) -> Result<Response> {
  match command {
    Command::User(cmd) => user(cmd, db),
    Command::Project(cmd) => project(cmd, db),
    Command::Issue(cmd) => issue(cmd, db),
    Command::Stat => Ok(Response::data(&db.stat_counts()?)?),
    Command::Chart(_) => Err(eyre!("chart requires a chart service")),
  }
}

pub async fn chart<S: CacheStorage>(service: &ChartService<S>, args: &ChartArgs) -> Result<Response> {
  let request = args.to_request()?;
  let response = service.chart(&request).await?;
  Ok(Response::data(&response)?)
}

fn user(cmd: UserCommand, db: &Database) -> Result<Response> {
  match cmd {
    UserCommand::Add { email } => {
      let id = db.create_user(&NewUser { email })?;
      Ok(Response::data(&json!({ "id": id }))?)
    }
    UserCommand::Batch { file } => {
      let users: Vec<NewUser> = read_batch(&file)?;
      let inserted = db.create_users(&users)?;
      Ok(Response::message("Users inserted successfully").with_data(&json!({ "inserted": inserted }))?)
    }
    UserCommand::List => Ok(Response::data(&db.list_users()?)?),
    UserCommand::Delete { id } => {
      db.delete_user(id)?;
      Ok(Response::message("user was deleted"))
    }
  }
}

fn project(cmd: ProjectCommand, db: &Database) -> Result<Response> {
  match cmd {
    ProjectCommand::Add { name, blocked } => {
      let id = db.create_project(&NewProject { name, blocked })?;
      Ok(Response::data(&json!({ "id": id }))?)
    }
    ProjectCommand::Batch { file } => {
      let projects: Vec<NewProject> = read_batch(&file)?;
      let inserted = db.create_projects(&projects)?;
      Ok(Response::message("Projects inserted successfully").with_data(&json!({ "inserted": inserted }))?)
    }
    ProjectCommand::List => Ok(Response::data(&db.list_projects()?)?),
    ProjectCommand::Delete { id } => {
      db.delete_project(id)?;
      Ok(Response::message("project was deleted"))
    }
  }
}

fn issue(cmd: IssueCommand, db: &Database) -> Result<Response> {
  match cmd {
    IssueCommand::Add { issue } => {
      let new: NewIssue = serde_json::from_str(&issue).map_err(|e| eyre!("invalid JSON payload: {}", e))?;
      let id = db.create_issue(&new)?;
      Ok(Response::data(&json!({ "id": id }))?)
    }
    IssueCommand::Batch { file } => {
      let issues: Vec<NewIssue> = read_batch(&file)?;
      let inserted = db.create_issues(&issues)?;
      Ok(Response::message("Issues inserted successfully").with_data(&json!({ "inserted": inserted }))?)
    }
    IssueCommand::List => Ok(Response::data(&db.list_issues()?)?),
    IssueCommand::Get { id } => Ok(Response::data(&db.get_issue(id)?)?),
    IssueCommand::Update { id, changes } => {
      let payload: Value = serde_json::from_str(&changes).map_err(|e| eyre!("invalid JSON payload: {}", e))?;
      let request = MutationRequest::parse(payload)?;
      let diff_id = db.update_issue(id, &request)?;
      Ok(Response::data(&json!({ "id": diff_id }))?)
    }
    IssueCommand::Delete { id } => {
      db.delete_issue(id)?;
      Ok(Response::message("issue was deleted"))
    }
  }
}

/// Read a JSON array of creation payloads from `path`, or stdin for "-".
fn read_batch<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
  let contents = if path == Path::new("-") {
    let mut buf = String::new();
    std::io::stdin()
      .read_to_string(&mut buf)
      .map_err(|e| eyre!("Failed to read stdin: {}", e))?;
    buf
  } else {
    std::fs::read_to_string(path).map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?
  };

  serde_json::from_str(&contents).map_err(|e| eyre!("invalid JSON payload: {}", e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheLayer, NoopStorage};
  use std::sync::Arc;

  fn run(db: &Database, command: Command) -> Response {
    execute(command, db).unwrap()
  }

  fn seed(db: &Database) -> (u64, u64) {
    let user = run(db, Command::User(UserCommand::Add {
      email: "dev@example.com".to_string(),
    }));
    let project = run(db, Command::Project(ProjectCommand::Add {
      name: "tracker".to_string(),
      blocked: false,
    }));
    (
      user.data["id"].as_u64().unwrap(),
      project.data["id"].as_u64().unwrap(),
    )
  }

  fn add_issue(db: &Database, user_id: u64, project_id: u64) -> u64 {
    let issue = json!({
      "title": "Login fails",
      "user_id": user_id,
      "project_id": project_id,
      "priority": 2,
      "status": "open",
      "deadline": "01-12-2026",
      "watchers": [user_id],
    });
    let response = run(db, Command::Issue(IssueCommand::Add {
      issue: issue.to_string(),
    }));
    response.data["id"].as_u64().unwrap()
  }

  #[test]
  fn test_add_list_and_delete_users() {
    let db = Database::open_in_memory().unwrap();
    let (user_id, _) = seed(&db);

    let list = run(&db, Command::User(UserCommand::List));
    assert_eq!(list.data[0]["email"], "dev@example.com");

    let deleted = run(&db, Command::User(UserCommand::Delete { id: user_id }));
    assert_eq!(deleted.message, "user was deleted");
    let list = run(&db, Command::User(UserCommand::List));
    assert_eq!(list.data, json!([]));
  }

  #[test]
  fn test_update_returns_diff_id() {
    let db = Database::open_in_memory().unwrap();
    let (user_id, project_id) = seed(&db);
    let issue_id = add_issue(&db, user_id, project_id);

    let response = run(&db, Command::Issue(IssueCommand::Update {
      id: issue_id,
      changes: r#"{"status": "in_progress"}"#.to_string(),
    }));

    assert_eq!(response.message, "");
    assert_eq!(response.data["id"], 1);
    let list = run(&db, Command::Issue(IssueCommand::List));
    assert_eq!(list.data[0]["status"], "in_progress");
    assert_eq!(list.data[0]["watchers"], json!([user_id]));
  }

  #[test]
  fn test_get_issue_and_missing_issue() {
    let db = Database::open_in_memory().unwrap();
    let (user_id, project_id) = seed(&db);
    let issue_id = add_issue(&db, user_id, project_id);

    let response = run(&db, Command::Issue(IssueCommand::Get { id: issue_id }));
    assert_eq!(response.data["title"], "Login fails");
    assert_eq!(response.data["deadline"], "2026-12-01");

    let missing = execute(Command::Issue(IssueCommand::Get { id: issue_id + 1 }), &db);
    assert!(missing.unwrap_err().to_string().contains("not found"));
  }

  #[test]
  fn test_update_rejects_bad_payloads() {
    let db = Database::open_in_memory().unwrap();
    let (user_id, project_id) = seed(&db);
    let issue_id = add_issue(&db, user_id, project_id);

    for changes in ["not json", "[1, 2]", r#"{"status": "done"}"#, r#"{"priority": 9}"#] {
      let result = execute(
        Command::Issue(IssueCommand::Update {
          id: issue_id,
          changes: changes.to_string(),
        }),
        &db,
      );
      assert!(result.is_err(), "accepted {}", changes);
    }
  }

  #[test]
  fn test_stat_counts() {
    let db = Database::open_in_memory().unwrap();
    let (user_id, project_id) = seed(&db);
    add_issue(&db, user_id, project_id);

    let response = run(&db, Command::Stat);
    assert_eq!(
      response.data,
      json!({ "count_of_issues": 1, "count_of_projects": 1, "count_of_users": 1 })
    );
  }

  #[test]
  fn test_chart_args_build_request() {
    let args = ChartArgs {
      group_by: Some("status".to_string()),
      chart_type: Some("line".to_string()),
      filter: vec!["priority=2".to_string(), "user=1".to_string()],
      ..Default::default()
    };
    let request = args.to_request().unwrap();
    assert_eq!(request.group_by, "status");
    assert_eq!(request.chart_type, "line");
    assert_eq!(request.filters.len(), 2);
    assert_eq!(request.filters[0].value, "2");

    let bad = ChartArgs {
      filter: vec!["priority".to_string()],
      ..Default::default()
    };
    assert!(bad.to_request().is_err());
  }

  #[test]
  fn test_chart_args_accept_json_request() {
    let args = ChartArgs {
      request: Some(r#"{"groupBy": "project", "chartType": "bar", "filters": []}"#.to_string()),
      ..Default::default()
    };
    let request = args.to_request().unwrap();
    assert_eq!(request.group_by, "project");
    assert_eq!(request.chart_type, "bar");
  }

  #[tokio::test]
  async fn test_bar_chart_through_command() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let (user_id, project_id) = seed(&db);
    add_issue(&db, user_id, project_id);
    let service = ChartService::new(Arc::clone(&db), CacheLayer::new(NoopStorage));

    let args = ChartArgs {
      group_by: Some("project".to_string()),
      ..Default::default()
    };
    let response = chart(&service, &args).await.unwrap();

    assert_eq!(response.data["groupBy"], "project");
    assert_eq!(response.data["result"][project_id.to_string()], 1);
    assert_eq!(response.data["fields"][0]["name"], "tracker");
  }
}
