//! Execution and agent events
//!
//! Producers (orchestrator, supervisor) publish typed events; consumers
//! (SSE responders, WebSocket clients) subscribe with a filter and receive
//! them on their own bounded channel.

mod bus;
mod types;

pub use bus::{EventBus, EventFilter, Subscription, DEFAULT_CHANNEL_CAPACITY};
pub use types::{EventPayload, ExecutionEvent};
