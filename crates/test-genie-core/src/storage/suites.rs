//! Suite request and execution history
//!
//! Provides SQLite-backed storage for:
//! - suite request queueing with monotonic status updates
//! - execution records written with their phases and observations in one transaction

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::database::Database;
use super::{format_ts, parse_ts};
use crate::suite::{
    Observation, PhaseResult, PhaseSummary, QueueSnapshot, SuiteExecutionResult, SuiteRequest,
    SuiteRequestStatus,
};

const REQUEST_COLUMNS: &str = "id, scenario_name, requested_types, coverage_target, priority, status,
     notes, delegation_issue_id, estimated_queue_time, created_at, updated_at";

const EXECUTION_COLUMNS: &str = "id, scenario_name, suite_request_id, preset_used, started_at,
     completed_at, success, total_phases, passed, failed, skipped, total_duration_seconds";

struct RequestRow {
    id: String,
    scenario_name: String,
    requested_types: String,
    coverage_target: i64,
    priority: String,
    status: String,
    notes: Option<String>,
    delegation_issue_id: Option<String>,
    estimated_queue_time: i64,
    created_at: String,
    updated_at: String,
}

impl RequestRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            scenario_name: row.get(1)?,
            requested_types: row.get(2)?,
            coverage_target: row.get(3)?,
            priority: row.get(4)?,
            status: row.get(5)?,
            notes: row.get(6)?,
            delegation_issue_id: row.get(7)?,
            estimated_queue_time: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_request(self) -> Result<SuiteRequest> {
        Ok(SuiteRequest {
            requested_types: serde_json::from_str(&self.requested_types)
                .with_context(|| format!("Corrupt requested_types for {}", self.id))?,
            coverage_target: self.coverage_target.clamp(0, 100) as u8,
            priority: self.priority.parse().map_err(anyhow::Error::msg)?,
            status: self.status.parse().map_err(anyhow::Error::msg)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            estimated_queue_time: self.estimated_queue_time.max(0) as u64,
            id: self.id,
            scenario_name: self.scenario_name,
            notes: self.notes,
            delegation_issue_id: self.delegation_issue_id,
        })
    }
}

struct ExecutionRow {
    id: String,
    scenario_name: String,
    suite_request_id: Option<String>,
    preset_used: String,
    started_at: String,
    completed_at: String,
    success: bool,
    total: i64,
    passed: i64,
    failed: i64,
    skipped: i64,
    total_duration_seconds: f64,
}

impl ExecutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            scenario_name: row.get(1)?,
            suite_request_id: row.get(2)?,
            preset_used: row.get(3)?,
            started_at: row.get(4)?,
            completed_at: row.get(5)?,
            success: row.get(6)?,
            total: row.get(7)?,
            passed: row.get(8)?,
            failed: row.get(9)?,
            skipped: row.get(10)?,
            total_duration_seconds: row.get(11)?,
        })
    }
}

/// SQLite-backed suite history
pub struct SuiteStore<'a> {
    db: &'a Database,
}

impl<'a> SuiteStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn insert_request(&self, request: &SuiteRequest) -> Result<()> {
        self.db.conn().execute(
            "INSERT INTO suite_requests (id, scenario_name, requested_types, coverage_target, priority,
                 status, notes, delegation_issue_id, estimated_queue_time, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                request.id,
                request.scenario_name,
                serde_json::to_string(&request.requested_types)?,
                request.coverage_target,
                request.priority.as_str(),
                request.status.as_str(),
                request.notes,
                request.delegation_issue_id,
                request.estimated_queue_time as i64,
                format_ts(&request.created_at),
                format_ts(&request.updated_at),
            ],
        )?;
        tracing::info!(
            request_id = %request.id,
            scenario = %request.scenario_name,
            "Queued suite request"
        );
        Ok(())
    }

    pub fn list_requests(&self, limit: usize) -> Result<Vec<SuiteRequest>> {
        let sql = format!(
            "SELECT {} FROM suite_requests ORDER BY created_at DESC, id DESC LIMIT ?1",
            REQUEST_COLUMNS
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([limit as i64], RequestRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RequestRow::into_request).collect()
    }

    pub fn get_request(&self, id: &str) -> Result<Option<SuiteRequest>> {
        let sql = format!("SELECT {} FROM suite_requests WHERE id = ?1", REQUEST_COLUMNS);
        self.db
            .conn()
            .query_row(&sql, [id], RequestRow::from_row)
            .optional()?
            .map(RequestRow::into_request)
            .transpose()
    }

    pub fn latest_request(&self, scenario: &str) -> Result<Option<SuiteRequest>> {
        let sql = format!(
            "SELECT {} FROM suite_requests WHERE scenario_name = ?1
             ORDER BY created_at DESC, id DESC LIMIT 1",
            REQUEST_COLUMNS
        );
        self.db
            .conn()
            .query_row(&sql, [scenario], RequestRow::from_row)
            .optional()?
            .map(RequestRow::into_request)
            .transpose()
    }

    pub fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT status, COUNT(*) FROM suite_requests GROUP BY status")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut snapshot = QueueSnapshot::default();
        for (status, count) in counts {
            let count = count.max(0) as usize;
            match status.parse::<SuiteRequestStatus>() {
                Ok(SuiteRequestStatus::Queued) => snapshot.queued = count,
                Ok(SuiteRequestStatus::Delegated) => snapshot.delegated = count,
                Ok(SuiteRequestStatus::Running) => snapshot.running = count,
                Ok(SuiteRequestStatus::Completed) => snapshot.completed = count,
                Ok(SuiteRequestStatus::Failed) => snapshot.failed = count,
                Err(e) => tracing::warn!(error = %e, "Ignoring unknown suite request status"),
            }
        }
        Ok(snapshot)
    }

    pub fn set_request_status(
        &self,
        id: &str,
        status: SuiteRequestStatus,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let rows = self.db.conn().execute(
            "UPDATE suite_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), format_ts(&at), id],
        )?;
        Ok(rows)
    }

    /// Write an execution, its phases and observations atomically
    pub fn insert_execution(&self, result: &SuiteExecutionResult) -> Result<()> {
        let tx = self.db.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO executions (id, scenario_name, suite_request_id, preset_used, started_at,
                 completed_at, success, total_phases, passed, failed, skipped, total_duration_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                result.execution_id,
                result.scenario_name,
                result.suite_request_id,
                result.preset_used,
                format_ts(&result.started_at),
                format_ts(&result.completed_at),
                result.success,
                result.phase_summary.total as i64,
                result.phase_summary.passed as i64,
                result.phase_summary.failed as i64,
                result.phase_summary.skipped as i64,
                result.total_duration_seconds,
            ],
        )?;

        {
            let mut phase_stmt = tx.prepare(
                "INSERT INTO execution_phases (execution_id, position, name, status, duration_seconds, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (position, phase) in result.phases.iter().enumerate() {
                phase_stmt.execute(params![
                    result.execution_id,
                    position as i64,
                    phase.name,
                    phase.status.as_str(),
                    phase.duration_seconds,
                    phase.error,
                ])?;
            }

            let mut obs_stmt = tx.prepare(
                "INSERT INTO observations (execution_id, phase, message, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for observation in &result.observations {
                obs_stmt.execute(params![
                    result.execution_id,
                    observation.phase,
                    observation.message,
                    format_ts(&observation.recorded_at),
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!(
            execution_id = %result.execution_id,
            scenario = %result.scenario_name,
            success = result.success,
            "Recorded suite execution"
        );
        Ok(())
    }

    pub fn list_executions(
        &self,
        scenario: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SuiteExecutionResult>> {
        let sql = format!(
            "SELECT {} FROM executions
             WHERE (?1 IS NULL OR scenario_name = ?1)
             ORDER BY started_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            EXECUTION_COLUMNS
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![scenario, limit as i64, offset as i64],
                ExecutionRow::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    pub fn get_execution(&self, id: &str) -> Result<Option<SuiteExecutionResult>> {
        let sql = format!("SELECT {} FROM executions WHERE id = ?1", EXECUTION_COLUMNS);
        self.db
            .conn()
            .query_row(&sql, [id], ExecutionRow::from_row)
            .optional()?
            .map(|row| self.hydrate(row))
            .transpose()
    }

    fn hydrate(&self, row: ExecutionRow) -> Result<SuiteExecutionResult> {
        let mut phase_stmt = self.db.conn().prepare(
            "SELECT name, status, duration_seconds, error FROM execution_phases
             WHERE execution_id = ?1 ORDER BY position",
        )?;
        let phases = phase_stmt
            .query_map([&row.id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, f64>(2)?,
                    r.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(name, status, duration_seconds, error)| -> Result<PhaseResult> {
                Ok(PhaseResult {
                    status: status.parse().map_err(anyhow::Error::msg)?,
                    name,
                    duration_seconds,
                    error,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut obs_stmt = self.db.conn().prepare(
            "SELECT phase, message, recorded_at FROM observations
             WHERE execution_id = ?1 ORDER BY id",
        )?;
        let observations = obs_stmt
            .query_map([&row.id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(phase, message, recorded_at)| -> Result<Observation> {
                Ok(Observation {
                    phase,
                    message,
                    recorded_at: parse_ts(&recorded_at)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SuiteExecutionResult {
            execution_id: row.id,
            scenario_name: row.scenario_name,
            suite_request_id: row.suite_request_id,
            preset_used: row.preset_used,
            started_at: parse_ts(&row.started_at)?,
            completed_at: parse_ts(&row.completed_at)?,
            success: row.success,
            phase_summary: PhaseSummary {
                total: row.total.max(0) as usize,
                passed: row.passed.max(0) as usize,
                failed: row.failed.max(0) as usize,
                skipped: row.skipped.max(0) as usize,
            },
            phases,
            observations,
            total_duration_seconds: row.total_duration_seconds,
        })
    }
}
