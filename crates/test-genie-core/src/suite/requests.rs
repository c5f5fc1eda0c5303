//! Suite request intake

use chrono::{DateTime, Utc};

use super::presets::is_known_phase;
use super::types::{NewSuiteRequest, Priority, QueueSnapshot, SuiteRequest, SuiteRequestStatus};
use crate::error::{GenieError, GenieResult};
use crate::safety::validate_scenario_name;

pub const DEFAULT_COVERAGE_TARGET: u8 = 80;
const SECONDS_PER_PHASE: f64 = 60.0;

/// Seconds a new request is expected to wait behind the pending queue
pub fn estimate_queue_seconds(pending_ahead: usize, phase_count: usize, priority: Priority) -> u64 {
    let base = (pending_ahead + 1) as f64 * SECONDS_PER_PHASE * phase_count.max(1) as f64;
    (base * priority.queue_factor()).round() as u64
}

/// Validate intake fields and build a queued request
pub fn build_suite_request(
    input: NewSuiteRequest,
    snapshot: &QueueSnapshot,
    now: DateTime<Utc>,
) -> GenieResult<SuiteRequest> {
    validate_scenario_name(&input.scenario_name)?;

    let mut requested_types: Vec<String> = Vec::new();
    for kind in input.requested_types {
        let kind = kind.trim().to_ascii_lowercase();
        if !is_known_phase(&kind) {
            return Err(GenieError::validation(format!("unknown test type '{}'", kind)));
        }
        if !requested_types.contains(&kind) {
            requested_types.push(kind);
        }
    }
    if requested_types.is_empty() {
        return Err(GenieError::validation("requested_types must not be empty"));
    }

    let coverage_target = input.coverage_target.unwrap_or(DEFAULT_COVERAGE_TARGET);
    if coverage_target > 100 {
        return Err(GenieError::validation("coverage_target must be between 0 and 100"));
    }

    let priority = input.priority.unwrap_or_default();
    Ok(SuiteRequest {
        id: uuid::Uuid::new_v4().to_string(),
        scenario_name: input.scenario_name.trim().to_string(),
        estimated_queue_time: estimate_queue_seconds(
            snapshot.pending(),
            requested_types.len(),
            priority,
        ),
        requested_types,
        coverage_target,
        priority,
        status: SuiteRequestStatus::Queued,
        notes: input.notes.filter(|n| !n.trim().is_empty()),
        delegation_issue_id: None,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(types: &[&str]) -> NewSuiteRequest {
        NewSuiteRequest {
            scenario_name: "demo".into(),
            requested_types: types.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_queued_request_with_defaults() {
        let request = build_suite_request(
            input(&["unit", "Unit", "integration"]),
            &QueueSnapshot::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(request.status, SuiteRequestStatus::Queued);
        assert_eq!(request.requested_types, vec!["unit", "integration"]);
        assert_eq!(request.coverage_target, DEFAULT_COVERAGE_TARGET);
        assert_eq!(request.priority, Priority::Normal);
        assert_eq!(request.estimated_queue_time, 120);
    }

    #[test]
    fn rejects_bad_input() {
        let snapshot = QueueSnapshot::default();
        assert!(build_suite_request(input(&[]), &snapshot, Utc::now()).is_err());
        assert!(build_suite_request(input(&["fuzz"]), &snapshot, Utc::now()).is_err());

        let mut bad = input(&["unit"]);
        bad.coverage_target = Some(101);
        assert!(build_suite_request(bad, &snapshot, Utc::now()).is_err());

        let mut bad = input(&["unit"]);
        bad.scenario_name = " ".into();
        assert!(build_suite_request(bad, &snapshot, Utc::now()).is_err());
    }

    #[test]
    fn estimate_scales_with_queue_and_priority() {
        assert_eq!(estimate_queue_seconds(0, 1, Priority::Normal), 60);
        assert_eq!(estimate_queue_seconds(2, 2, Priority::Normal), 360);
        assert_eq!(estimate_queue_seconds(2, 2, Priority::High), 180);
        assert_eq!(estimate_queue_seconds(0, 2, Priority::Low), 180);
    }
}
