//! Agent supervisor
//!
//! Validates a spawn request, registers one agent per prompt, launches the
//! external agent binary and watches it until a terminal state.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::registry::AgentRegistry;
use super::types::{Agent, AgentStatus};
use crate::clock::SharedClock;
use crate::config::GenieConfig;
use crate::error::{GenieError, GenieResult};
use crate::events::EventBus;
use crate::output::{BoundedOutput, LossyLines, DEFAULT_MAX_BYTES, DEFAULT_MAX_LINES};
use crate::process::{isolate_process_group, kill_process_tree, ProcessGroupHandle};
use crate::safety;

pub const MAX_AGENT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const DEFAULT_MODEL: &str = "sonnet";
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-model default run time
pub fn default_timeout_for_model(model: &str) -> Duration {
    let model = model.to_ascii_lowercase();
    if model.contains("haiku") {
        Duration::from_secs(10 * 60)
    } else if model.contains("opus") {
        Duration::from_secs(20 * 60)
    } else {
        Duration::from_secs(15 * 60)
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub agent_binary: String,
    pub repo_root: PathBuf,
    pub max_timeout: Duration,
    pub output_max_lines: usize,
    pub output_max_bytes: usize,
}

impl SupervisorConfig {
    pub fn from_genie(config: &GenieConfig) -> Self {
        Self {
            agent_binary: config.agent_binary.clone(),
            repo_root: config.repo_root.clone(),
            max_timeout: MAX_AGENT_TIMEOUT,
            output_max_lines: DEFAULT_MAX_LINES,
            output_max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// Request to spawn one agent per prompt
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpawnRequest {
    pub scenario: String,
    pub scope: Vec<String>,
    pub phases: Vec<String>,
    pub model: String,
    pub prompts: Vec<String>,
    pub tools: Vec<String>,
    pub timeout_seconds: Option<u64>,
    pub session_id: Option<String>,
    pub skip_permissions: bool,
    pub max_files: usize,
    pub max_file_kb: usize,
}

/// Request after safety validation
struct ValidatedSpawn {
    scenario: String,
    scope: Vec<String>,
    phases: Vec<String>,
    model: String,
    tools: Vec<String>,
    timeout: Duration,
    session_id: Option<String>,
    preamble: String,
}

enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
    TimedOut,
}

pub struct AgentSupervisor {
    registry: Arc<AgentRegistry>,
    bus: Arc<EventBus>,
    clock: SharedClock,
    config: SupervisorConfig,
}

impl AgentSupervisor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        bus: Arc<EventBus>,
        clock: SharedClock,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            registry,
            bus,
            clock,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn resolve_timeout(&self, model: &str, requested: Option<u64>) -> Duration {
        requested
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| default_timeout_for_model(model))
            .min(self.config.max_timeout)
    }

    fn validate(&self, request: &SpawnRequest) -> GenieResult<ValidatedSpawn> {
        if request.skip_permissions {
            return Err(GenieError::validation(
                "skip_permissions is not allowed for spawned agents",
            ));
        }
        safety::validate_scenario_name(&request.scenario)?;
        if request.prompts.is_empty() {
            return Err(GenieError::validation("at least one prompt is required"));
        }

        let tools = if request.tools.is_empty() {
            safety::SAFE_CAPABILITIES.iter().map(|t| t.to_string()).collect()
        } else {
            request.tools.clone()
        };
        safety::validate_tools(&tools)?;
        for prompt in &request.prompts {
            safety::validate_prompt(prompt)?;
        }

        let scenario = request.scenario.trim().to_string();
        let scope = safety::validate_scope_paths(&scenario, &request.scope, &self.config.repo_root)?;
        let model = match request.model.trim() {
            "" => DEFAULT_MODEL.to_string(),
            model => model.to_string(),
        };
        let preamble = safety::generate_safety_preamble(
            &scenario,
            &scope,
            &self.config.repo_root,
            request.max_files,
            request.max_file_kb,
        );

        Ok(ValidatedSpawn {
            timeout: self.resolve_timeout(&model, request.timeout_seconds),
            scenario,
            scope,
            phases: request.phases.clone(),
            model,
            tools,
            session_id: request.session_id.clone(),
            preamble,
        })
    }

    /// Launch one agent per prompt without waiting for them
    ///
    /// Safety failures reject the whole request. Registry and launch
    /// failures are reported per prompt.
    pub fn spawn(&self, request: &SpawnRequest) -> GenieResult<Vec<GenieResult<Agent>>> {
        let validated = self.validate(request)?;
        Ok(request
            .prompts
            .iter()
            .enumerate()
            .map(|(index, prompt)| {
                self.launch(&validated, index, prompt, None)
                    .map(|(agent, _)| agent)
            })
            .collect())
    }

    /// Launch one agent per prompt and wait until every one is terminal
    pub async fn spawn_and_wait(
        &self,
        request: &SpawnRequest,
        parent: &CancellationToken,
    ) -> GenieResult<Vec<GenieResult<Agent>>> {
        let validated = self.validate(request)?;
        let launched: Vec<_> = request
            .prompts
            .iter()
            .enumerate()
            .map(|(index, prompt)| self.launch(&validated, index, prompt, Some(parent)))
            .collect();

        let mut results = Vec::with_capacity(launched.len());
        for outcome in launched {
            results.push(match outcome {
                Ok((_, handle)) => handle
                    .await
                    .map_err(|e| GenieError::internal(format!("agent watcher failed: {}", e))),
                Err(e) => Err(e),
            });
        }
        Ok(results)
    }

    fn launch(
        &self,
        spawn: &ValidatedSpawn,
        prompt_index: usize,
        prompt: &str,
        parent: Option<&CancellationToken>,
    ) -> GenieResult<(Agent, JoinHandle<Agent>)> {
        let mut agent = Agent::pending(&spawn.scenario, prompt, &spawn.model, self.clock.now())
            .with_scope(spawn.scope.clone())
            .with_session(spawn.session_id.clone());
        agent.phases = spawn.phases.clone();
        agent.prompt_index = prompt_index;
        agent.tools = spawn.tools.clone();
        agent.timeout_seconds = spawn.timeout.as_secs();

        let agent = self.registry.register(agent)?;
        let working_dir = safety::scenario_root(&self.config.repo_root, &spawn.scenario);

        let mut cmd = Command::new(&self.config.agent_binary);
        cmd.current_dir(&working_dir)
            .arg("--directory")
            .arg(&working_dir)
            .arg("--allowed-tools")
            .arg(spawn.tools.join(","))
            .arg("--model")
            .arg(&spawn.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!(
                    "failed to start agent binary '{}': {}",
                    self.config.agent_binary, e
                );
                tracing::error!(agent_id = %agent.id, error = %message, "Agent launch failed");
                if let Ok(failed) = self.registry.update_status(
                    &agent.id,
                    AgentStatus::Failed,
                    None,
                    None,
                    Some(message.clone()),
                ) {
                    self.bus.broadcast_agent_updated(&failed);
                }
                return Err(GenieError::internal(message));
            }
        };

        let cancel = parent.map(|p| p.child_token()).unwrap_or_default();
        let handle = Arc::new(ProcessGroupHandle::new(child.id()));
        if let Err(e) = self
            .registry
            .set_agent_process(&agent.id, cancel.clone(), handle)
        {
            tracing::debug!(agent_id = %agent.id, error = %e, "Agent stopped before its process was tracked");
        }

        let running = self
            .registry
            .update_status(&agent.id, AgentStatus::Running, None, None, None)?;
        self.bus.broadcast_agent_updated(&running);

        tracing::info!(
            agent_id = %running.id,
            scenario = %running.scenario,
            pid = ?running.pid,
            model = %running.model,
            timeout_secs = spawn.timeout.as_secs(),
            "Agent launched"
        );

        let watcher = AgentWatcher {
            registry: self.registry.clone(),
            bus: self.bus.clone(),
            snapshot: running.clone(),
            timeout: spawn.timeout,
            cancel,
            max_lines: self.config.output_max_lines,
            max_bytes: self.config.output_max_bytes,
        };
        let full_prompt = format!("{}{}", spawn.preamble, prompt);
        let join = tokio::spawn(watcher.run(child, full_prompt));

        Ok((running, join))
    }
}

/// Owns one running agent process until it reaches a terminal state
struct AgentWatcher {
    registry: Arc<AgentRegistry>,
    bus: Arc<EventBus>,
    snapshot: Agent,
    timeout: Duration,
    cancel: CancellationToken,
    max_lines: usize,
    max_bytes: usize,
}

impl AgentWatcher {
    async fn run(self, mut child: Child, prompt: String) -> Agent {
        let agent_id = self.snapshot.id.clone();

        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if stdin.write_all(prompt.as_bytes()).await.is_ok() {
                    let _ = stdin.shutdown().await;
                }
            });
        }

        let stdout_buf = Arc::new(Mutex::new(BoundedOutput::new(self.max_lines, self.max_bytes)));
        let stderr_buf = Arc::new(Mutex::new(BoundedOutput::new(self.max_lines, self.max_bytes)));

        let stdout_task = tokio::spawn(stream_stdout(
            child.stdout.take(),
            agent_id.clone(),
            self.bus.clone(),
            stdout_buf.clone(),
        ));
        let stderr_task = tokio::spawn(collect_lines(child.stderr.take(), stderr_buf.clone()));

        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = self.cancel.cancelled() => WaitOutcome::Cancelled,
            _ = tokio::time::sleep(self.timeout) => WaitOutcome::TimedOut,
        };

        if !matches!(outcome, WaitOutcome::Exited(_)) {
            if let Some(pid) = child.id() {
                if let Err(e) = kill_process_tree(pid) {
                    tracing::warn!(agent_id = %agent_id, error = %e, "Failed to terminate agent process group");
                }
            }
            let _ = child.kill().await;
        }

        join_reader_with_timeout(stdout_task).await;
        join_reader_with_timeout(stderr_task).await;

        let output = stdout_buf.lock().text();
        let (status, error) = {
            let stderr = stderr_buf.lock();
            match outcome {
                WaitOutcome::Exited(Ok(exit)) if exit.success() => (AgentStatus::Completed, None),
                WaitOutcome::Exited(Ok(exit)) => {
                    let detail = if stderr.is_empty() {
                        format!("agent exited with {}", exit)
                    } else {
                        stderr.text()
                    };
                    (AgentStatus::Failed, Some(detail))
                }
                WaitOutcome::Exited(Err(e)) => (
                    AgentStatus::Failed,
                    Some(format!("failed waiting for agent: {}", e)),
                ),
                WaitOutcome::Cancelled => (AgentStatus::Stopped, Some("cancelled".to_string())),
                WaitOutcome::TimedOut => (
                    AgentStatus::Timeout,
                    Some(format!(
                        "agent exceeded timeout of {}s",
                        self.timeout.as_secs()
                    )),
                ),
            }
        };

        let finished = match self
            .registry
            .update_status(&agent_id, status, None, Some(output.clone()), error.clone())
        {
            Ok(agent) => agent,
            Err(e) => {
                tracing::warn!(agent_id = %agent_id, error = %e, "Agent vanished before final update");
                let mut agent = self.snapshot;
                agent.status = status;
                agent.output = output;
                agent.error = error;
                agent
            }
        };

        tracing::info!(agent_id = %agent_id, status = %finished.status, "Agent finished");
        self.bus.broadcast_agent_updated(&finished);
        finished
    }
}

async fn stream_stdout<R>(
    pipe: Option<R>,
    agent_id: String,
    bus: Arc<EventBus>,
    buffer: Arc<Mutex<BoundedOutput>>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else {
        return;
    };

    let mut lines = LossyLines::new(BufReader::new(pipe));
    let mut sequence = 0u64;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                sequence += 1;
                bus.broadcast_agent_output(&agent_id, &line, sequence);
                buffer.lock().push_line(&line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(agent_id = %agent_id, error = %e, "Agent stdout read failed");
                break;
            }
        }
    }
}

async fn collect_lines<R>(pipe: Option<R>, buffer: Arc<Mutex<BoundedOutput>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else {
        return;
    };

    let mut lines = LossyLines::new(BufReader::new(pipe));
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => buffer.lock().push_line(&line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Agent stderr read failed");
                break;
            }
        }
    }
}

async fn join_reader_with_timeout(mut handle: JoinHandle<()>) {
    if tokio::time::timeout(READER_JOIN_TIMEOUT, &mut handle)
        .await
        .is_err()
    {
        handle.abort();
        let _ = handle.await;
    }
}
