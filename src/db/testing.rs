//! Seed helpers for store tests.

use crate::model::{NewIssue, NewProject, NewUser, Status};

use super::Database;

pub fn seed_user_and_project(db: &Database) -> (u64, u64) {
  let user_id = db
    .create_user(&NewUser {
      email: "owner@example.com".to_string(),
    })
    .unwrap();
  let project_id = db
    .create_project(&NewProject {
      name: "tracker".to_string(),
      blocked: false,
    })
    .unwrap();
  (user_id, project_id)
}

pub fn new_issue(user_id: u64, project_id: u64, status: Status) -> NewIssue {
  NewIssue {
    title: "Crash on save".to_string(),
    user_id,
    project_id,
    priority: 3,
    status,
    deadline: "30-06-2026".to_string(),
    watchers: Vec::new(),
  }
}

/// Create an owner, a project and one issue in `status`.
pub fn seed_issue(db: &Database, status: Status) -> u64 {
  let (user_id, project_id) = seed_user_and_project(db);
  db.create_issue(&new_issue(user_id, project_id, status))
    .unwrap()
}
