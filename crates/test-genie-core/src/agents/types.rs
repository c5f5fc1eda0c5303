//! Agent records and scope locks

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lifecycle state of a spawned agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Stopped,
}

impl AgentStatus {
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AgentStatus::Pending | AgentStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Timeout => "timeout",
            AgentStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AgentStatus::Pending),
            "running" => Ok(AgentStatus::Running),
            "completed" => Ok(AgentStatus::Completed),
            "failed" => Ok(AgentStatus::Failed),
            "timeout" => Ok(AgentStatus::Timeout),
            "stopped" => Ok(AgentStatus::Stopped),
            other => Err(format!("unknown agent status: {}", other)),
        }
    }
}

/// One spawned sub-agent
///
/// Plain data; cancellation and process handles are held by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub scenario: String,
    /// Scenario-relative paths; empty means the whole scenario
    pub scope: Vec<String>,
    pub phases: Vec<String>,
    pub model: String,
    pub prompt_hash: String,
    pub prompt_index: usize,
    pub prompt_text: String,
    pub tools: Vec<String>,
    pub timeout_seconds: u64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: AgentStatus,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub hostname: String,
}

impl Agent {
    /// New pending agent with a fresh id and computed prompt hash
    pub fn pending(scenario: &str, prompt: &str, model: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: None,
            scenario: scenario.to_string(),
            scope: Vec::new(),
            phases: Vec::new(),
            model: model.to_string(),
            prompt_hash: prompt_hash(prompt),
            prompt_index: 0,
            prompt_text: prompt.to_string(),
            tools: Vec::new(),
            timeout_seconds: 0,
            started_at,
            completed_at: None,
            status: AgentStatus::Pending,
            output: String::new(),
            error: None,
            pid: None,
            hostname: local_hostname(),
        }
    }

    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

/// Reservation of a path set within one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeLock {
    pub scenario: String,
    pub paths: Vec<String>,
    pub agent_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ScopeLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// First 16 hex characters of SHA-256 over the prompt text
pub fn prompt_hash(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_hash_is_sixteen_hex_chars() {
        let hash = prompt_hash("Write tests");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, prompt_hash("Write tests"));
        assert_ne!(hash, prompt_hash("Write more tests"));
    }

    #[test]
    fn status_terminality() {
        assert!(AgentStatus::Running.is_active());
        assert!(AgentStatus::Timeout.is_terminal());
        assert_eq!("stopped".parse::<AgentStatus>(), Ok(AgentStatus::Stopped));
        assert!("done".parse::<AgentStatus>().is_err());
    }
}
