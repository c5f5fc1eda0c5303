//! Suite request and execution records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }

    /// Multiplier applied to queue-time estimates
    pub fn queue_factor(&self) -> f64 {
        match self {
            Priority::High => 0.5,
            Priority::Normal => 1.0,
            Priority::Low => 1.5,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteRequestStatus {
    Queued,
    Delegated,
    Running,
    Completed,
    Failed,
}

impl SuiteRequestStatus {
    fn rank(&self) -> u8 {
        match self {
            SuiteRequestStatus::Queued => 0,
            SuiteRequestStatus::Delegated => 1,
            SuiteRequestStatus::Running => 2,
            SuiteRequestStatus::Completed | SuiteRequestStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SuiteRequestStatus::Completed | SuiteRequestStatus::Failed)
    }

    /// Status only moves forward and terminal statuses are final
    pub fn can_transition_to(&self, next: SuiteRequestStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteRequestStatus::Queued => "queued",
            SuiteRequestStatus::Delegated => "delegated",
            SuiteRequestStatus::Running => "running",
            SuiteRequestStatus::Completed => "completed",
            SuiteRequestStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SuiteRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(SuiteRequestStatus::Queued),
            "delegated" => Ok(SuiteRequestStatus::Delegated),
            "running" => Ok(SuiteRequestStatus::Running),
            "completed" => Ok(SuiteRequestStatus::Completed),
            "failed" => Ok(SuiteRequestStatus::Failed),
            other => Err(format!("unknown suite request status: {}", other)),
        }
    }
}

/// Queued unit of suite work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteRequest {
    pub id: String,
    pub scenario_name: String,
    pub requested_types: Vec<String>,
    pub coverage_target: u8,
    pub priority: Priority,
    pub status: SuiteRequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_issue_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Seconds
    pub estimated_queue_time: u64,
}

/// Body of a queue request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewSuiteRequest {
    pub scenario_name: String,
    pub requested_types: Vec<String>,
    pub coverage_target: Option<u8>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
}

/// Counts of queued work used by the health endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub queued: usize,
    pub delegated: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueSnapshot {
    pub fn pending(&self) -> usize {
        self.queued + self.delegated
    }
}

/// Input to one orchestration run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SuiteExecutionRequest {
    pub scenario_name: String,
    pub preset: Option<String>,
    pub phases: Option<Vec<String>>,
    pub skip: Vec<String>,
    pub fail_fast: bool,
    pub suite_request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Failed,
    Timeout,
    Stopped,
    Skipped,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
            PhaseStatus::Timeout => "timeout",
            PhaseStatus::Stopped => "stopped",
            PhaseStatus::Skipped => "skipped",
        }
    }

    /// Timeouts and stops count as failures in the summary
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            PhaseStatus::Failed | PhaseStatus::Timeout | PhaseStatus::Stopped
        )
    }
}

impl FromStr for PhaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(PhaseStatus::Completed),
            "failed" => Ok(PhaseStatus::Failed),
            "timeout" => Ok(PhaseStatus::Timeout),
            "stopped" => Ok(PhaseStatus::Stopped),
            "skipped" => Ok(PhaseStatus::Skipped),
            other => Err(format!("unknown phase status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub name: String,
    pub status: PhaseStatus,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl PhaseSummary {
    pub fn from_phases(phases: &[PhaseResult]) -> Self {
        let mut summary = PhaseSummary {
            total: phases.len(),
            ..Default::default()
        };
        for phase in phases {
            match phase.status {
                PhaseStatus::Completed => summary.passed += 1,
                PhaseStatus::Skipped => summary.skipped += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub phase: String,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteExecutionResult {
    pub execution_id: String,
    pub scenario_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_request_id: Option<String>,
    pub preset_used: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub success: bool,
    pub phase_summary: PhaseSummary,
    pub phases: Vec<PhaseResult>,
    pub observations: Vec<Observation>,
    pub total_duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_status_is_monotonic() {
        use SuiteRequestStatus::*;
        assert!(Queued.can_transition_to(Running));
        assert!(Delegated.can_transition_to(Running));
        assert!(Running.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Queued));
        assert!(!Completed.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Completed));
    }

    #[test]
    fn summary_counts_timeouts_as_failures() {
        let phase = |name: &str, status| PhaseResult {
            name: name.into(),
            status,
            duration_seconds: 0.0,
            error: None,
        };
        let summary = PhaseSummary::from_phases(&[
            phase("unit", PhaseStatus::Completed),
            phase("integration", PhaseStatus::Timeout),
            phase("business", PhaseStatus::Skipped),
        ]);
        assert_eq!(
            summary,
            PhaseSummary {
                total: 3,
                passed: 1,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(summary.passed + summary.failed + summary.skipped, summary.total);
    }
}
