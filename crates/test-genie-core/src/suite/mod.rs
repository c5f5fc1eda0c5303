//! Suite orchestration
//!
//! Turns an execution request into an ordered phase list, runs each phase
//! through a [`PhaseHandler`], streams events, and records the outcome.

mod emitter;
mod handlers;
mod orchestrator;
mod presets;
mod requests;
mod types;

pub use emitter::{
    EventCallback, ExecutionEmitter, MAX_OBSERVATIONS_PER_PHASE, MAX_OBSERVATION_BYTES,
};
pub use handlers::{
    AgentPhase, PhaseContext, PhaseHandler, PhaseOutcome, ScriptPhase, DEFAULT_PHASE_TIMEOUT,
};
pub use orchestrator::{SuiteOrchestrator, CUSTOM_PRESET};
pub use presets::{is_known_phase, preset_names, preset_phases, DEFAULT_PRESET, KNOWN_PHASES};
pub use requests::{build_suite_request, estimate_queue_seconds, DEFAULT_COVERAGE_TARGET};
pub use types::{
    NewSuiteRequest, Observation, PhaseResult, PhaseStatus, PhaseSummary, Priority,
    QueueSnapshot, SuiteExecutionRequest, SuiteExecutionResult, SuiteRequest, SuiteRequestStatus,
};
