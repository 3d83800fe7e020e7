/// Schema for entity tables and the diff log.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL CHECK (length(email) <= 256),
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(name) <= 256),
    blocked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(title) <= 256),
    user_id INTEGER NOT NULL REFERENCES users(id),
    project_id INTEGER NOT NULL REFERENCES projects(id),
    priority INTEGER NOT NULL CHECK (priority IN (1, 2, 3, 4, 5)),
    status TEXT NOT NULL CHECK (status IN ('open', 'in_progress', 'closed', 'canceled')),
    deadline TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status, deleted_at);

CREATE TABLE IF NOT EXISTS issue_watchers (
    issue_id INTEGER NOT NULL REFERENCES issues(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    PRIMARY KEY (issue_id, user_id)
);

-- Append-only diff log. Rows are never updated or deleted; soft-deleting an
-- issue leaves its diffs in place.
CREATE TABLE IF NOT EXISTS issue_diffs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL REFERENCES issues(id),
    seq INTEGER NOT NULL,
    raw_mutation BLOB NOT NULL,
    projection BLOB NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (issue_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_issue_diffs_time
    ON issue_diffs(issue_id, created_at, seq);
"#;
