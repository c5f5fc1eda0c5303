//! Repository port used by the orchestrator and HTTP layer

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::database::Database;
use super::suites::SuiteStore;
use crate::error::{GenieError, GenieResult};
use crate::suite::{QueueSnapshot, SuiteExecutionResult, SuiteRequest, SuiteRequestStatus};

pub trait SuiteRepository: Send + Sync {
    fn queue_suite_request(&self, request: &SuiteRequest) -> GenieResult<()>;
    fn list_suite_requests(&self, limit: usize) -> GenieResult<Vec<SuiteRequest>>;
    fn get_suite_request(&self, id: &str) -> GenieResult<Option<SuiteRequest>>;
    fn latest_suite_request(&self, scenario: &str) -> GenieResult<Option<SuiteRequest>>;
    fn queue_snapshot(&self) -> GenieResult<QueueSnapshot>;

    /// Move a request forward; regressions and changes to terminal requests fail
    fn update_suite_request_status(
        &self,
        id: &str,
        status: SuiteRequestStatus,
        at: DateTime<Utc>,
    ) -> GenieResult<SuiteRequest>;

    fn record_execution(&self, result: &SuiteExecutionResult) -> GenieResult<()>;
    fn list_executions(
        &self,
        scenario: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> GenieResult<Vec<SuiteExecutionResult>>;
    fn get_execution(&self, id: &str) -> GenieResult<Option<SuiteExecutionResult>>;

    /// Cheap liveness check for health reporting
    fn ping(&self) -> GenieResult<()>;
}

/// [`SuiteRepository`] over a single SQLite connection
pub struct SqliteRepository {
    db: Mutex<Database>,
}

impl SqliteRepository {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open(path: &Path) -> GenieResult<Self> {
        Ok(Self::new(Database::new(path)?))
    }

    pub fn in_memory() -> GenieResult<Self> {
        Ok(Self::new(Database::in_memory()?))
    }

    fn with_store<T>(&self, f: impl FnOnce(&SuiteStore<'_>) -> anyhow::Result<T>) -> GenieResult<T> {
        let db = self.db.lock();
        let store = SuiteStore::new(&db);
        f(&store).map_err(GenieError::Internal)
    }
}

impl SuiteRepository for SqliteRepository {
    fn queue_suite_request(&self, request: &SuiteRequest) -> GenieResult<()> {
        self.with_store(|store| store.insert_request(request))
    }

    fn list_suite_requests(&self, limit: usize) -> GenieResult<Vec<SuiteRequest>> {
        self.with_store(|store| store.list_requests(limit))
    }

    fn get_suite_request(&self, id: &str) -> GenieResult<Option<SuiteRequest>> {
        self.with_store(|store| store.get_request(id))
    }

    fn latest_suite_request(&self, scenario: &str) -> GenieResult<Option<SuiteRequest>> {
        self.with_store(|store| store.latest_request(scenario))
    }

    fn queue_snapshot(&self) -> GenieResult<QueueSnapshot> {
        self.with_store(|store| store.queue_snapshot())
    }

    fn update_suite_request_status(
        &self,
        id: &str,
        status: SuiteRequestStatus,
        at: DateTime<Utc>,
    ) -> GenieResult<SuiteRequest> {
        let db = self.db.lock();
        let store = SuiteStore::new(&db);

        let mut request = store
            .get_request(id)?
            .ok_or_else(|| GenieError::SuiteRequestNotFound(id.to_string()))?;
        if !request.status.can_transition_to(status) {
            return Err(GenieError::validation(format!(
                "suite request {} cannot move from {} to {}",
                id, request.status, status
            )));
        }
        if request.status != status {
            store.set_request_status(id, status, at)?;
            request.status = status;
            request.updated_at = at;
        }
        Ok(request)
    }

    fn record_execution(&self, result: &SuiteExecutionResult) -> GenieResult<()> {
        self.with_store(|store| store.insert_execution(result))
    }

    fn list_executions(
        &self,
        scenario: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> GenieResult<Vec<SuiteExecutionResult>> {
        self.with_store(|store| store.list_executions(scenario, limit, offset))
    }

    fn get_execution(&self, id: &str) -> GenieResult<Option<SuiteExecutionResult>> {
        self.with_store(|store| store.get_execution(id))
    }

    fn ping(&self) -> GenieResult<()> {
        self.with_store(|store| store.queue_snapshot().map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{
        Observation, PhaseResult, PhaseStatus, PhaseSummary, Priority,
    };
    use tempfile::TempDir;

    fn create_test_repo() -> (SqliteRepository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let repo = SqliteRepository::open(&db_path).expect("Failed to create database");
        (repo, temp_dir)
    }

    fn suite_request(scenario: &str, created_at: DateTime<Utc>) -> SuiteRequest {
        SuiteRequest {
            id: uuid::Uuid::new_v4().to_string(),
            scenario_name: scenario.to_string(),
            requested_types: vec!["unit".into(), "integration".into()],
            coverage_target: 80,
            priority: Priority::High,
            status: SuiteRequestStatus::Queued,
            notes: Some("nightly".into()),
            delegation_issue_id: None,
            created_at,
            updated_at: created_at,
            estimated_queue_time: 60,
        }
    }

    fn execution(scenario: &str, started_at: DateTime<Utc>) -> SuiteExecutionResult {
        let phases = vec![
            PhaseResult {
                name: "unit".into(),
                status: PhaseStatus::Failed,
                duration_seconds: 1.5,
                error: Some("exit status 1".into()),
            },
            PhaseResult {
                name: "integration".into(),
                status: PhaseStatus::Skipped,
                duration_seconds: 0.0,
                error: None,
            },
        ];
        SuiteExecutionResult {
            execution_id: uuid::Uuid::new_v4().to_string(),
            scenario_name: scenario.to_string(),
            suite_request_id: None,
            preset_used: "custom".into(),
            started_at,
            completed_at: started_at + chrono::Duration::seconds(2),
            success: false,
            phase_summary: PhaseSummary::from_phases(&phases),
            phases,
            observations: vec![Observation {
                phase: "unit".into(),
                message: "3 tests failed".into(),
                recorded_at: started_at,
            }],
            total_duration_seconds: 2.0,
        }
    }

    #[test]
    fn queue_get_and_latest() {
        let (repo, _dir) = create_test_repo();
        let now = Utc::now();
        let older = suite_request("demo", now - chrono::Duration::minutes(5));
        let newer = suite_request("demo", now);
        repo.queue_suite_request(&older).unwrap();
        repo.queue_suite_request(&newer).unwrap();
        repo.queue_suite_request(&suite_request("other", now)).unwrap();

        let fetched = repo.get_suite_request(&older.id).unwrap().unwrap();
        assert_eq!(fetched.requested_types, older.requested_types);
        assert_eq!(fetched.priority, Priority::High);

        let latest = repo.latest_suite_request("demo").unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
        assert!(repo.latest_suite_request("missing").unwrap().is_none());
        assert_eq!(repo.list_suite_requests(2).unwrap().len(), 2);
        assert_eq!(repo.queue_snapshot().unwrap().queued, 3);
    }

    #[test]
    fn status_updates_are_monotonic() {
        let (repo, _dir) = create_test_repo();
        let request = suite_request("demo", Utc::now());
        repo.queue_suite_request(&request).unwrap();

        let running = repo
            .update_suite_request_status(&request.id, SuiteRequestStatus::Running, Utc::now())
            .unwrap();
        assert_eq!(running.status, SuiteRequestStatus::Running);
        assert!(repo
            .update_suite_request_status(&request.id, SuiteRequestStatus::Queued, Utc::now())
            .is_err());

        repo.update_suite_request_status(&request.id, SuiteRequestStatus::Completed, Utc::now())
            .unwrap();
        assert!(repo
            .update_suite_request_status(&request.id, SuiteRequestStatus::Failed, Utc::now())
            .is_err());

        let err = repo
            .update_suite_request_status("missing", SuiteRequestStatus::Running, Utc::now())
            .unwrap_err();
        assert!(matches!(err, GenieError::SuiteRequestNotFound(_)));

        let snapshot = repo.queue_snapshot().unwrap();
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.pending(), 0);
    }

    #[test]
    fn executions_round_trip_with_phases_and_observations() {
        let (repo, _dir) = create_test_repo();
        let now = Utc::now();
        let first = execution("demo", now - chrono::Duration::minutes(1));
        let second = execution("demo", now);
        repo.record_execution(&first).unwrap();
        repo.record_execution(&second).unwrap();
        repo.record_execution(&execution("other", now)).unwrap();

        let stored = repo.get_execution(&first.execution_id).unwrap().unwrap();
        assert_eq!(stored.phases, first.phases);
        assert_eq!(stored.phase_summary, first.phase_summary);
        assert_eq!(stored.observations.len(), 1);
        assert_eq!(stored.observations[0].message, "3 tests failed");

        let demo = repo.list_executions(Some("demo"), 10, 0).unwrap();
        assert_eq!(demo.len(), 2);
        assert_eq!(demo[0].execution_id, second.execution_id);
        assert_eq!(repo.list_executions(Some("demo"), 10, 1).unwrap().len(), 1);
        assert_eq!(repo.list_executions(None, 10, 0).unwrap().len(), 3);
        assert!(repo.get_execution("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_execution_id_fails_atomically() {
        let (repo, _dir) = create_test_repo();
        let result = execution("demo", Utc::now());
        repo.record_execution(&result).unwrap();

        let err = repo.record_execution(&result).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
        let stored = repo.get_execution(&result.execution_id).unwrap().unwrap();
        assert_eq!(stored.observations.len(), 1);
    }
}
