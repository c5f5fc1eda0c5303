//! Phase handlers

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::emitter::ExecutionEmitter;
use crate::agents::{AgentStatus, AgentSupervisor, SpawnRequest};
use crate::events::EventPayload;
use crate::output::{BoundedOutput, LossyLines};
use crate::paths;
use crate::process::isolate_process_group;

pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Everything a handler needs to run one phase
pub struct PhaseContext {
    pub scenario: String,
    pub phase: String,
    pub index: usize,
    pub total: usize,
    pub cancel: CancellationToken,
    emitter: Arc<ExecutionEmitter>,
}

impl PhaseContext {
    pub fn new(
        scenario: String,
        phase: String,
        index: usize,
        total: usize,
        cancel: CancellationToken,
        emitter: Arc<ExecutionEmitter>,
    ) -> Self {
        Self {
            scenario,
            phase,
            index,
            total,
            cancel,
            emitter,
        }
    }

    pub fn observe(&self, message: &str) {
        self.emitter.observe(&self.phase, message);
    }

    pub fn progress(&self, completed: usize, total: usize, message: Option<String>) {
        let percent = if total == 0 {
            0.0
        } else {
            (completed as f64 / total as f64 * 100.0).min(100.0)
        };
        self.emitter.emit(EventPayload::Progress {
            phase: self.phase.clone(),
            completed,
            total,
            percent,
            message,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Passed,
    Failed(String),
    TimedOut(String),
    Stopped,
}

#[async_trait]
pub trait PhaseHandler: Send + Sync {
    async fn run(&self, ctx: &PhaseContext) -> PhaseOutcome;
}

/// Runs `<scenario>/test/phases/test-<phase>.sh`, one observation per stdout line
pub struct ScriptPhase {
    scenarios_root: PathBuf,
    timeout: Duration,
}

impl ScriptPhase {
    pub fn new(scenarios_root: PathBuf) -> Self {
        Self {
            scenarios_root,
            timeout: DEFAULT_PHASE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PhaseHandler for ScriptPhase {
    async fn run(&self, ctx: &PhaseContext) -> PhaseOutcome {
        if !ctx
            .phase
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return PhaseOutcome::Failed(format!("invalid phase name '{}'", ctx.phase));
        }

        let script = paths::phase_script(&self.scenarios_root, &ctx.scenario, &ctx.phase);
        if !script.is_file() {
            return PhaseOutcome::Failed(format!("phase script not found: {}", script.display()));
        }

        let mut cmd = Command::new("bash");
        cmd.arg(&script)
            .current_dir(paths::scenario_dir(&self.scenarios_root, &ctx.scenario))
            .env("TEST_GENIE_SCENARIO", &ctx.scenario)
            .env("TEST_GENIE_PHASE", &ctx.phase)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return PhaseOutcome::Failed(format!("failed to start phase script: {}", e)),
        };

        let mut stdout = child.stdout.take().map(|s| LossyLines::new(BufReader::new(s)));
        let stderr_task = child.stderr.take().map(|pipe| {
            tokio::spawn(async move {
                let mut buffer = BoundedOutput::new(200, 32 * 1024);
                let mut lines = LossyLines::new(BufReader::new(pipe));
                while let Ok(Some(line)) = lines.next_line().await {
                    buffer.push_line(&line);
                }
                buffer
            })
        });

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                line = async {
                    match stdout.as_mut() {
                        Some(lines) => lines.next_line().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match line {
                        Ok(Some(line)) => {
                            let line = line.trim_end();
                            if !line.is_empty() {
                                ctx.observe(line);
                            }
                        }
                        Ok(None) => stdout = None,
                        Err(e) => {
                            tracing::debug!(phase = %ctx.phase, error = %e, "Phase stdout read failed");
                            stdout = None;
                        }
                    }
                }
                status = child.wait(), if stdout.is_none() => break Ok(status),
                _ = ctx.cancel.cancelled() => break Err(PhaseOutcome::Stopped),
                _ = &mut deadline => break Err(PhaseOutcome::TimedOut(format!(
                    "phase '{}' exceeded {}s",
                    ctx.phase,
                    self.timeout.as_secs()
                ))),
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(outcome) => {
                if let Some(pid) = child.id() {
                    let _ = crate::process::kill_process_tree(pid);
                }
                let _ = child.kill().await;
                return outcome;
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => BoundedOutput::default(),
        };

        match status {
            Ok(exit) if exit.success() => PhaseOutcome::Passed,
            Ok(exit) => PhaseOutcome::Failed(
                stderr
                    .last_line()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("phase script exited with {}", exit)),
            ),
            Err(e) => PhaseOutcome::Failed(format!("failed waiting for phase script: {}", e)),
        }
    }
}

/// Runs a phase by spawning sub-agents, one per prompt
pub struct AgentPhase {
    supervisor: Arc<AgentSupervisor>,
    template: SpawnRequest,
}

impl AgentPhase {
    /// `template.scenario` and `template.phases` are filled in per run
    pub fn new(supervisor: Arc<AgentSupervisor>, template: SpawnRequest) -> Self {
        Self {
            supervisor,
            template,
        }
    }
}

#[async_trait]
impl PhaseHandler for AgentPhase {
    async fn run(&self, ctx: &PhaseContext) -> PhaseOutcome {
        let mut request = self.template.clone();
        request.scenario = ctx.scenario.clone();
        request.phases = vec![ctx.phase.clone()];

        let results = match self.supervisor.spawn_and_wait(&request, &ctx.cancel).await {
            Ok(results) => results,
            Err(e) => return PhaseOutcome::Failed(e.to_string()),
        };

        let total = results.len();
        let mut failures = Vec::new();
        let mut timed_out = false;
        for (done, result) in results.into_iter().enumerate() {
            match result {
                Ok(agent) => {
                    ctx.observe(&format!("agent {} finished: {}", agent.id, agent.status));
                    match agent.status {
                        AgentStatus::Completed => {}
                        AgentStatus::Timeout => {
                            timed_out = true;
                            failures.push(format!("agent {} timed out", agent.id));
                        }
                        status => failures.push(format!(
                            "agent {} {}: {}",
                            agent.id,
                            status,
                            agent.error.unwrap_or_default()
                        )),
                    }
                }
                Err(e) => failures.push(e.to_string()),
            }
            ctx.progress(done + 1, total, None);
        }

        if ctx.cancel.is_cancelled() {
            PhaseOutcome::Stopped
        } else if failures.is_empty() {
            PhaseOutcome::Passed
        } else if timed_out && failures.len() == 1 {
            PhaseOutcome::TimedOut(failures.remove(0))
        } else {
            PhaseOutcome::Failed(failures.join("; "))
        }
    }
}
