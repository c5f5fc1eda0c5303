//! Agent lifecycle
//!
//! - [`AgentRegistry`] owns live agents and their scope locks
//! - [`AgentSupervisor`] validates, launches and watches agent processes

mod registry;
mod scope;
mod supervisor;
mod types;

pub use registry::{AgentRegistry, STOPPED_BY_USER};
pub use scope::scopes_overlap;
pub use supervisor::{
    default_timeout_for_model, AgentSupervisor, SpawnRequest, SupervisorConfig, DEFAULT_MODEL,
    MAX_AGENT_TIMEOUT,
};
pub use types::{prompt_hash, Agent, AgentStatus, ScopeLock};
