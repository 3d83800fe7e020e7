//! Domain types for users, projects and issues.

mod types;
mod update;

pub use types::{
  check_priority, check_text_len, parse_deadline, Issue, NewIssue, NewProject, NewUser, Project,
  Status, User,
};
pub use update::{IssueUpdate, MutationRequest};
