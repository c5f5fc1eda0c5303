//! Persistence layer
//!
//! SQLite-backed history for:
//! - Queued suite requests
//! - Suite executions with their ordered phases
//! - Append-only execution observations
//!
//! The orchestrator and HTTP layer only see the [`SuiteRepository`] port.

mod database;
mod repository;
mod suites;

pub use database::Database;
pub use repository::{SqliteRepository, SuiteRepository};
pub use suites::SuiteStore;

use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC 3339 so stored timestamps sort lexically
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| anyhow::anyhow!("invalid timestamp '{}': {}", raw, e))?
        .with_timezone(&Utc))
}
