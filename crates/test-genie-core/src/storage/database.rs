//! SQLite connection and schema migrations

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

const SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS suite_requests (
    id TEXT PRIMARY KEY,
    scenario_name TEXT NOT NULL,
    requested_types TEXT NOT NULL,
    coverage_target INTEGER NOT NULL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    notes TEXT,
    delegation_issue_id TEXT,
    estimated_queue_time INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_suite_requests_scenario
    ON suite_requests(scenario_name, created_at);
CREATE INDEX IF NOT EXISTS idx_suite_requests_status
    ON suite_requests(status);

CREATE TABLE IF NOT EXISTS executions (
    id TEXT PRIMARY KEY,
    scenario_name TEXT NOT NULL,
    suite_request_id TEXT,
    preset_used TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    success INTEGER NOT NULL,
    total_phases INTEGER NOT NULL,
    passed INTEGER NOT NULL,
    failed INTEGER NOT NULL,
    skipped INTEGER NOT NULL,
    total_duration_seconds REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_executions_scenario
    ON executions(scenario_name, started_at);

CREATE TABLE IF NOT EXISTS execution_phases (
    execution_id TEXT NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    duration_seconds REAL NOT NULL,
    error TEXT,
    PRIMARY KEY (execution_id, position)
);

CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id TEXT NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
    phase TEXT NOT NULL,
    message TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_observations_execution
    ON observations(execution_id, id);
";

/// Owned SQLite connection with the schema applied
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            self.conn
                .execute_batch(SCHEMA_V1)
                .context("Failed to apply schema v1")?;
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tracing::info!(from = version, to = SCHEMA_VERSION, "Database migrated");
        }
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn migrations_are_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("nested/test.db");
        {
            let _db = Database::new(&db_path).expect("Failed to create database");
        }
        let db = Database::new(&db_path).expect("Failed to reopen database");
        let version: i32 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
