//! Agent registry
//!
//! Single owner of live agent records and scope locks. Every mutation runs
//! under one write lock with no suspension inside; readers get copies.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::scope::scopes_overlap;
use super::types::{Agent, AgentStatus, ScopeLock};
use crate::clock::SharedClock;
use crate::error::{GenieError, GenieResult};
use crate::process::ProcessHandle;

pub const STOPPED_BY_USER: &str = "stopped by user";

struct AgentEntry {
    agent: Agent,
    cancel: Option<CancellationToken>,
    process: Option<Arc<dyn ProcessHandle>>,
}

impl AgentEntry {
    /// Cancel the context and kill the process, if installed
    fn interrupt(&self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        if let Some(process) = &self.process {
            if let Err(e) = process.kill() {
                tracing::warn!(agent_id = %self.agent.id, error = %e, "Failed to kill agent process");
            }
        }
    }
}

#[derive(Default)]
struct RegistryState {
    agents: HashMap<String, AgentEntry>,
    scope_locks: Vec<ScopeLock>,
}

impl RegistryState {
    fn sweep_expired(&mut self, now: DateTime<Utc>) {
        let before = self.scope_locks.len();
        self.scope_locks.retain(|lock| !lock.is_expired(now));
        let swept = before - self.scope_locks.len();
        if swept > 0 {
            tracing::debug!(swept, "Swept expired scope locks");
        }
    }

    fn conflicts(&self, scenario: &str, paths: &[String]) -> Vec<String> {
        self.scope_locks
            .iter()
            .filter(|lock| lock.scenario == scenario && scopes_overlap(&lock.paths, paths))
            .map(|lock| lock.agent_id.clone())
            .collect()
    }

    fn release_lock(&mut self, agent_id: &str) {
        self.scope_locks.retain(|lock| lock.agent_id != agent_id);
    }

    /// Terminal transition: stamps completion, drops handles and the lock together
    fn finish(
        &mut self,
        id: &str,
        status: AgentStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Agent> {
        let entry = self.agents.get_mut(id)?;
        entry.agent.status = status;
        if error.is_some() {
            entry.agent.error = error;
        }
        entry.agent.completed_at = Some(now.max(entry.agent.started_at));
        entry.cancel = None;
        entry.process = None;
        let snapshot = entry.agent.clone();
        self.release_lock(id);
        Some(snapshot)
    }
}

pub struct AgentRegistry {
    state: RwLock<RegistryState>,
    clock: SharedClock,
    lock_timeout: chrono::Duration,
}

impl AgentRegistry {
    pub fn new(clock: SharedClock, lock_timeout: std::time::Duration) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            clock,
            lock_timeout: chrono::Duration::from_std(lock_timeout)
                .unwrap_or_else(|_| chrono::Duration::minutes(15)),
        }
    }

    /// Insert a new agent, reserving its scope
    ///
    /// Fails with `ScopeConflict` when the scope overlaps a live lock in the
    /// same scenario, and with `DuplicateAgent` when a non-terminal agent
    /// already runs the same prompt (or session) there.
    pub fn register(&self, agent: Agent) -> GenieResult<Agent> {
        let now = self.clock.now();
        let mut state = self.state.write();
        state.sweep_expired(now);

        let conflicts = state.conflicts(&agent.scenario, &agent.scope);
        if !conflicts.is_empty() {
            tracing::info!(
                scenario = %agent.scenario,
                conflicts = ?conflicts,
                "Spawn rejected: scope conflict"
            );
            return Err(GenieError::ScopeConflict {
                agent_ids: conflicts,
            });
        }

        let duplicate = state.agents.values().find(|entry| {
            let existing = &entry.agent;
            existing.status.is_active()
                && existing.scenario == agent.scenario
                && (existing.prompt_hash == agent.prompt_hash
                    || (agent.session_id.is_some() && existing.session_id == agent.session_id))
        });
        if let Some(existing) = duplicate {
            return Err(GenieError::DuplicateAgent {
                scenario: agent.scenario.clone(),
                existing_id: existing.agent.id.clone(),
            });
        }

        state.scope_locks.push(ScopeLock {
            scenario: agent.scenario.clone(),
            paths: agent.scope.clone(),
            agent_id: agent.id.clone(),
            acquired_at: now,
            expires_at: now + self.lock_timeout,
        });

        tracing::info!(
            agent_id = %agent.id,
            scenario = %agent.scenario,
            scope = ?agent.scope,
            "Agent registered"
        );

        let snapshot = agent.clone();
        state.agents.insert(
            agent.id.clone(),
            AgentEntry {
                agent,
                cancel: None,
                process: None,
            },
        );
        Ok(snapshot)
    }

    /// Mutate an agent's status; terminal statuses release its lock
    ///
    /// Status changes to an agent that is already terminal are ignored; only
    /// missing output is filled in and the current snapshot is returned.
    pub fn update_status(
        &self,
        id: &str,
        status: AgentStatus,
        session_id: Option<String>,
        output: Option<String>,
        error: Option<String>,
    ) -> GenieResult<Agent> {
        let now = self.clock.now();
        let mut state = self.state.write();

        let entry = state
            .agents
            .get_mut(id)
            .ok_or_else(|| GenieError::NotFound(format!("agent {} not found", id)))?;

        if entry.agent.status.is_terminal() {
            if let Some(output) = output.filter(|_| entry.agent.output.is_empty()) {
                entry.agent.output = output;
            }
            return Ok(entry.agent.clone());
        }
        if session_id.is_some() {
            entry.agent.session_id = session_id;
        }
        if let Some(output) = output {
            entry.agent.output = output;
        }

        if status.is_terminal() {
            tracing::info!(agent_id = %id, status = %status, "Agent finished");
            return state
                .finish(id, status, error, now)
                .ok_or_else(|| GenieError::NotFound(format!("agent {} not found", id)));
        }

        entry.agent.status = status;
        if error.is_some() {
            entry.agent.error = error;
        }
        Ok(entry.agent.clone())
    }

    /// Install cancellation primitives after the process has started
    ///
    /// If the agent was stopped in the meantime the process is interrupted
    /// immediately and `NotRunning` is returned.
    pub fn set_agent_process(
        &self,
        id: &str,
        cancel: CancellationToken,
        process: Arc<dyn ProcessHandle>,
    ) -> GenieResult<()> {
        let mut state = self.state.write();
        let entry = state
            .agents
            .get_mut(id)
            .ok_or_else(|| GenieError::NotFound(format!("agent {} not found", id)))?;

        entry.agent.pid = process.pid();
        entry.cancel = Some(cancel);
        entry.process = Some(process);

        if entry.agent.status.is_terminal() {
            entry.interrupt();
            entry.cancel = None;
            entry.process = None;
            return Err(GenieError::NotRunning(id.to_string()));
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Agent> {
        self.state.read().agents.get(id).map(|e| e.agent.clone())
    }

    /// Agents that are pending or running
    pub fn list_active(&self) -> Vec<Agent> {
        let state = self.state.read();
        let mut agents: Vec<Agent> = state
            .agents
            .values()
            .filter(|e| e.agent.status.is_active())
            .map(|e| e.agent.clone())
            .collect();
        sort_newest_first(&mut agents);
        agents
    }

    pub fn count_active(&self) -> usize {
        self.state
            .read()
            .agents
            .values()
            .filter(|e| e.agent.status.is_active())
            .count()
    }

    /// All agents, newest first
    pub fn list_all(&self, limit: usize) -> Vec<Agent> {
        let state = self.state.read();
        let mut agents: Vec<Agent> = state.agents.values().map(|e| e.agent.clone()).collect();
        sort_newest_first(&mut agents);
        agents.truncate(limit);
        agents
    }

    /// Cancel and kill one agent, transitioning it to `stopped`
    pub fn stop(&self, id: &str) -> GenieResult<Agent> {
        let now = self.clock.now();
        let mut state = self.state.write();

        let entry = state
            .agents
            .get(id)
            .ok_or_else(|| GenieError::NotFound(format!("agent {} not found", id)))?;
        if entry.agent.status.is_terminal() {
            return Err(GenieError::NotRunning(id.to_string()));
        }
        entry.interrupt();

        tracing::info!(agent_id = %id, "Agent stopped by user");
        state
            .finish(id, AgentStatus::Stopped, Some(STOPPED_BY_USER.to_string()), now)
            .ok_or_else(|| GenieError::NotFound(format!("agent {} not found", id)))
    }

    /// Stop every non-terminal agent, returning the stopped ids
    pub fn stop_all(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut state = self.state.write();

        let ids: Vec<String> = state
            .agents
            .values()
            .filter(|e| e.agent.status.is_active())
            .map(|e| {
                e.interrupt();
                e.agent.id.clone()
            })
            .collect();

        for id in &ids {
            state.finish(id, AgentStatus::Stopped, Some(STOPPED_BY_USER.to_string()), now);
        }
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "Stopped all agents");
        }
        ids
    }

    /// Remove terminal agents that completed before `now - older_than`
    pub fn cleanup_completed(&self, older_than: std::time::Duration) -> usize {
        let older_than =
            chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::zero());
        let cutoff = self.clock.now() - older_than;
        let mut state = self.state.write();

        let before = state.agents.len();
        state.agents.retain(|_, entry| {
            !(entry.agent.status.is_terminal()
                && entry.agent.completed_at.is_some_and(|at| at < cutoff))
        });
        let removed = before - state.agents.len();
        if removed > 0 {
            tracing::info!(removed, "Cleaned up completed agents");
        }
        removed
    }

    /// Agent ids whose live locks overlap `paths` in `scenario`
    pub fn check_conflicts(&self, scenario: &str, paths: &[String]) -> Vec<String> {
        let now = self.clock.now();
        let mut state = self.state.write();
        state.sweep_expired(now);
        state.conflicts(scenario, paths)
    }

    /// Snapshot of live scope locks
    pub fn active_locks(&self) -> Vec<ScopeLock> {
        let now = self.clock.now();
        let mut state = self.state.write();
        state.sweep_expired(now);
        state.scope_locks.clone()
    }
}

fn sort_newest_first(agents: &mut [Agent]) {
    agents.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
}
