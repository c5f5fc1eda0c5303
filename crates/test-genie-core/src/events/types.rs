//! Event schema shared by SSE and WebSocket delivery

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agents::Agent;
use crate::error::ErrorKind;
use crate::suite::{PhaseStatus, SuiteExecutionResult};

/// Event body, serialized as `{"type": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Connected {},
    PhaseStart {
        phase: String,
        index: usize,
        total: usize,
    },
    PhaseEnd {
        phase: String,
        index: usize,
        status: PhaseStatus,
        duration_seconds: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Observation {
        phase: String,
        message: String,
    },
    Progress {
        phase: String,
        completed: usize,
        total: usize,
        percent: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Complete(Box<SuiteExecutionResult>),
    AgentUpdated(Box<Agent>),
    AgentOutput {
        agent_id: String,
        output: String,
        sequence: u64,
    },
    AgentStopped {
        agent_id: String,
    },
    AgentsStoppedAll {
        count: usize,
    },
    Heartbeat {},
    Error {
        message: String,
        kind: ErrorKind,
    },
}

impl EventPayload {
    /// Value of the `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::Connected {} => "connected",
            EventPayload::PhaseStart { .. } => "phase_start",
            EventPayload::PhaseEnd { .. } => "phase_end",
            EventPayload::Observation { .. } => "observation",
            EventPayload::Progress { .. } => "progress",
            EventPayload::Complete(_) => "complete",
            EventPayload::AgentUpdated(_) => "agent_updated",
            EventPayload::AgentOutput { .. } => "agent_output",
            EventPayload::AgentStopped { .. } => "agent_stopped",
            EventPayload::AgentsStoppedAll { .. } => "agents_stopped_all",
            EventPayload::Heartbeat {} => "heartbeat",
            EventPayload::Error { .. } => "error",
        }
    }

    pub fn is_agent_event(&self) -> bool {
        matches!(
            self,
            EventPayload::AgentUpdated(_)
                | EventPayload::AgentOutput { .. }
                | EventPayload::AgentStopped { .. }
                | EventPayload::AgentsStoppedAll { .. }
        )
    }
}

/// One event on a stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
}

impl ExecutionEvent {
    pub fn new(payload: EventPayload, timestamp: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            payload,
            timestamp,
            sequence,
            execution_id: None,
        }
    }

    pub fn for_execution(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize event");
            format!(r#"{{"type":"error","data":{{"message":"serialization failed: {}"}}}}"#, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_type_data_timestamp() {
        let event = ExecutionEvent::new(
            EventPayload::PhaseStart {
                phase: "unit".into(),
                index: 0,
                total: 1,
            },
            Utc::now(),
            3,
        );
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["type"], "phase_start");
        assert_eq!(value["data"]["phase"], "unit");
        assert_eq!(value["data"]["total"], 1);
        assert_eq!(value["sequence"], 3);
        assert!(value["timestamp"].is_string());
        assert!(value.get("execution_id").is_none());
    }

    #[test]
    fn empty_payloads_serialize_as_objects() {
        let event = ExecutionEvent::new(EventPayload::Heartbeat {}, Utc::now(), 1);
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert!(value["data"].is_object());
    }
}
