//! Suite orchestrator

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::emitter::{EventCallback, ExecutionEmitter};
use super::handlers::{PhaseContext, PhaseHandler, PhaseOutcome};
use super::presets::{is_known_phase, preset_phases, DEFAULT_PRESET, KNOWN_PHASES};
use super::requests::build_suite_request;
use super::types::{
    NewSuiteRequest, PhaseResult, PhaseStatus, PhaseSummary, SuiteExecutionRequest,
    SuiteExecutionResult, SuiteRequest, SuiteRequestStatus,
};
use crate::clock::SharedClock;
use crate::error::{GenieError, GenieResult};
use crate::events::{EventBus, EventPayload};
use crate::safety::validate_scenario_name;
use crate::storage::SuiteRepository;

/// `preset_used` when the caller picked phases without a preset
pub const CUSTOM_PRESET: &str = "custom";

pub struct SuiteOrchestrator {
    repo: Arc<dyn SuiteRepository>,
    clock: SharedClock,
    bus: Option<Arc<EventBus>>,
    default_handler: Arc<dyn PhaseHandler>,
    handlers: HashMap<String, Arc<dyn PhaseHandler>>,
}

struct ResolvedPhases {
    preset_used: String,
    phases: Vec<String>,
}

impl SuiteOrchestrator {
    pub fn new(
        repo: Arc<dyn SuiteRepository>,
        clock: SharedClock,
        default_handler: Arc<dyn PhaseHandler>,
    ) -> Self {
        Self {
            repo,
            clock,
            bus: None,
            default_handler,
            handlers: HashMap::new(),
        }
    }

    /// Also publish execution events on the shared bus
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Route one phase to a dedicated handler
    pub fn with_handler(mut self, phase: &str, handler: Arc<dyn PhaseHandler>) -> Self {
        self.handlers.insert(phase.to_string(), handler);
        self
    }

    pub fn repository(&self) -> &Arc<dyn SuiteRepository> {
        &self.repo
    }

    /// Validate and persist a new queued request
    pub fn queue_request(&self, input: NewSuiteRequest) -> GenieResult<SuiteRequest> {
        let snapshot = self.repo.queue_snapshot()?;
        let request = build_suite_request(input, &snapshot, self.clock.now())?;
        self.repo.queue_suite_request(&request)?;
        info!(
            id = %request.id,
            scenario = %request.scenario_name,
            types = ?request.requested_types,
            "Queued suite request"
        );
        Ok(request)
    }

    /// Effective phase list in preset order
    pub fn resolve_phases(&self, request: &SuiteExecutionRequest) -> GenieResult<Vec<String>> {
        Ok(resolve(request)?.phases)
    }

    pub async fn execute(
        &self,
        request: &SuiteExecutionRequest,
        cancel: CancellationToken,
    ) -> GenieResult<SuiteExecutionResult> {
        self.run(request, cancel, None).await
    }

    /// Same as [`execute`](Self::execute), with every event also handed to `callback`
    pub async fn execute_with_events(
        &self,
        request: &SuiteExecutionRequest,
        cancel: CancellationToken,
        callback: EventCallback,
    ) -> GenieResult<SuiteExecutionResult> {
        self.run(request, cancel, Some(callback)).await
    }

    async fn run(
        &self,
        request: &SuiteExecutionRequest,
        cancel: CancellationToken,
        callback: Option<EventCallback>,
    ) -> GenieResult<SuiteExecutionResult> {
        validate_scenario_name(&request.scenario_name)?;
        let resolved = resolve(request)?;

        if let Some(id) = &request.suite_request_id {
            if self.repo.get_suite_request(id)?.is_none() {
                return Err(GenieError::SuiteRequestNotFound(id.clone()));
            }
            self.repo
                .update_suite_request_status(id, SuiteRequestStatus::Running, self.clock.now())?;
        }

        let execution_id = uuid::Uuid::new_v4().to_string();
        let emitter = Arc::new(ExecutionEmitter::new(
            execution_id.clone(),
            self.clock.clone(),
            self.bus.clone(),
            callback,
        ));
        let started_at = self.clock.now();
        let started = Instant::now();
        let total = resolved.phases.len();

        info!(
            execution_id = %execution_id,
            scenario = %request.scenario_name,
            preset = %resolved.preset_used,
            phases = ?resolved.phases,
            "Starting suite execution"
        );

        let mut results: Vec<PhaseResult> = Vec::with_capacity(total);
        let mut halted = false;

        for (index, phase) in resolved.phases.iter().enumerate() {
            if halted {
                results.push(skipped(phase));
                continue;
            }
            if cancel.is_cancelled() {
                results.push(PhaseResult {
                    name: phase.clone(),
                    status: PhaseStatus::Stopped,
                    duration_seconds: 0.0,
                    error: Some("execution cancelled".to_string()),
                });
                halted = true;
                continue;
            }

            emitter.emit(EventPayload::PhaseStart {
                phase: phase.clone(),
                index,
                total,
            });

            let ctx = PhaseContext::new(
                request.scenario_name.clone(),
                phase.clone(),
                index,
                total,
                cancel.child_token(),
                emitter.clone(),
            );
            let handler = self
                .handlers
                .get(phase)
                .cloned()
                .unwrap_or_else(|| self.default_handler.clone());

            let phase_started = Instant::now();
            let outcome = tokio::select! {
                outcome = handler.run(&ctx) => outcome,
                _ = cancel.cancelled() => PhaseOutcome::Stopped,
            };
            let duration_seconds = phase_started.elapsed().as_secs_f64();

            let (status, error) = match outcome {
                PhaseOutcome::Passed => (PhaseStatus::Completed, None),
                PhaseOutcome::Failed(e) => (PhaseStatus::Failed, Some(e)),
                PhaseOutcome::TimedOut(e) => (PhaseStatus::Timeout, Some(e)),
                PhaseOutcome::Stopped => {
                    (PhaseStatus::Stopped, Some("execution cancelled".to_string()))
                }
            };

            emitter.emit(EventPayload::Progress {
                phase: phase.clone(),
                completed: index + 1,
                total,
                percent: (index + 1) as f64 / total as f64 * 100.0,
                message: None,
            });
            emitter.emit(EventPayload::PhaseEnd {
                phase: phase.clone(),
                index,
                status,
                duration_seconds,
                error: error.clone(),
            });

            if status.counts_as_failure() {
                warn!(
                    execution_id = %execution_id,
                    phase = %phase,
                    status = status.as_str(),
                    error = error.as_deref().unwrap_or(""),
                    "Phase did not pass"
                );
            }
            if status == PhaseStatus::Stopped || (status.counts_as_failure() && request.fail_fast) {
                halted = true;
            }

            results.push(PhaseResult {
                name: phase.clone(),
                status,
                duration_seconds,
                error,
            });
        }

        let phase_summary = PhaseSummary::from_phases(&results);
        let result = SuiteExecutionResult {
            execution_id: execution_id.clone(),
            scenario_name: request.scenario_name.clone(),
            suite_request_id: request.suite_request_id.clone(),
            preset_used: resolved.preset_used,
            started_at,
            completed_at: self.clock.now().max(started_at),
            success: phase_summary.failed == 0 && results.len() == total,
            phase_summary,
            phases: results,
            observations: emitter.take_observations(),
            total_duration_seconds: started.elapsed().as_secs_f64(),
        };

        if let Err(e) = self.repo.record_execution(&result) {
            tracing::error!(execution_id = %execution_id, error = %e, "Failed to persist execution");
            emitter.emit(EventPayload::Error {
                message: format!("failed to persist execution: {}", e),
                kind: e.kind(),
            });
            self.finish_request(request, SuiteRequestStatus::Failed);
            return Err(GenieError::internal(format!(
                "failed to persist execution {}: {}",
                execution_id, e
            )));
        }

        self.finish_request(
            request,
            if result.success {
                SuiteRequestStatus::Completed
            } else {
                SuiteRequestStatus::Failed
            },
        );

        info!(
            execution_id = %execution_id,
            success = result.success,
            passed = result.phase_summary.passed,
            failed = result.phase_summary.failed,
            skipped = result.phase_summary.skipped,
            "Suite execution finished"
        );
        emitter.emit(EventPayload::Complete(Box::new(result.clone())));
        Ok(result)
    }

    fn finish_request(&self, request: &SuiteExecutionRequest, status: SuiteRequestStatus) {
        let Some(id) = &request.suite_request_id else {
            return;
        };
        if let Err(e) = self
            .repo
            .update_suite_request_status(id, status, self.clock.now())
        {
            warn!(id = %id, error = %e, "Failed to update suite request status");
        }
    }
}

fn skipped(phase: &str) -> PhaseResult {
    PhaseResult {
        name: phase.to_string(),
        status: PhaseStatus::Skipped,
        duration_seconds: 0.0,
        error: None,
    }
}

fn resolve(request: &SuiteExecutionRequest) -> GenieResult<ResolvedPhases> {
    let normalize = |names: &[String]| -> GenieResult<Vec<String>> {
        names
            .iter()
            .map(|name| {
                let name = name.trim().to_ascii_lowercase();
                if is_known_phase(&name) {
                    Ok(name)
                } else {
                    Err(GenieError::validation(format!("unknown phase '{}'", name)))
                }
            })
            .collect()
    };

    let preset = request
        .preset
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_ascii_lowercase);

    let (preset_used, base): (String, &[&str]) = match (&preset, &request.phases) {
        (Some(name), _) => match preset_phases(name) {
            Some(phases) => (name.clone(), phases),
            None => return Err(GenieError::validation(format!("unknown preset '{}'", name))),
        },
        (None, Some(_)) => (CUSTOM_PRESET.to_string(), KNOWN_PHASES),
        (None, None) => (
            DEFAULT_PRESET.to_string(),
            preset_phases(DEFAULT_PRESET).unwrap_or(KNOWN_PHASES),
        ),
    };

    let skip = normalize(request.skip.as_slice())?;
    let only = request.phases.as_deref().map(normalize).transpose()?;

    let phases: Vec<String> = base
        .iter()
        .filter(|p| !skip.iter().any(|s| s == *p))
        .filter(|p| only.as_ref().map_or(true, |o| o.iter().any(|s| s == *p)))
        .map(|p| p.to_string())
        .collect();

    if phases.is_empty() {
        return Err(GenieError::NoPhasesSelected);
    }
    Ok(ResolvedPhases {
        preset_used,
        phases,
    })
}
