//! test-genie core
//!
//! Control-plane building blocks shared by the server and the CLI:
//! - Safety gate for agent tools, prompts and scope paths
//! - Agent registry with scope locks, plus the process supervisor
//! - Event bus feeding SSE and WebSocket consumers
//! - Suite orchestration with persisted execution history
//! - Replay export compilation for browser-automation timelines

pub mod agents;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod paths;
pub mod process;
pub mod replay;
pub mod safety;
pub mod storage;
pub mod suite;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::GenieConfig;
pub use error::{ErrorKind, GenieError, GenieResult};
