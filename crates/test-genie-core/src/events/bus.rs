//! Bounded fan-out bus
//!
//! Each subscriber owns a bounded channel. Publishing never blocks: a full
//! channel drops the event with a warning, a closed one removes the
//! subscriber.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::types::{EventPayload, ExecutionEvent};
use crate::agents::Agent;
use crate::clock::SharedClock;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Which events a subscriber receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    /// Agent lifecycle and output events only
    Agents,
    /// Events stamped with this execution id
    Execution(String),
}

impl EventFilter {
    fn accepts(&self, event: &ExecutionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Agents => event.payload.is_agent_event(),
            EventFilter::Execution(id) => event.execution_id.as_deref() == Some(id.as_str()),
        }
    }
}

struct Subscriber {
    tx: mpsc::Sender<ExecutionEvent>,
    filter: EventFilter,
}

type SubscriberMap = DashMap<u64, Subscriber>;

pub struct EventBus {
    subscribers: Arc<SubscriberMap>,
    next_subscriber: AtomicU64,
    sequence: AtomicU64,
    capacity: usize,
    clock: SharedClock,
}

/// Receiving half of a subscription; unsubscribes on drop
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<ExecutionEvent>,
    subscribers: Weak<SubscriberMap>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<ExecutionEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ExecutionEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(&self.id);
        }
    }
}

impl EventBus {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_capacity(clock, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(clock: SharedClock, capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            next_subscriber: AtomicU64::new(1),
            sequence: AtomicU64::new(1),
            capacity: capacity.max(1),
            clock,
        }
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.insert(id, Subscriber { tx, filter });
        tracing::debug!(subscriber = id, "Event subscriber added");
        Subscription {
            id,
            rx,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every matching subscriber without blocking
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn publish(&self, event: ExecutionEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            if !entry.filter.accepts(&event) {
                continue;
            }
            match entry.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber = *entry.key(),
                        event_type = event.event_type(),
                        "Event channel full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        for id in closed {
            self.subscribers.remove(&id);
        }
        delivered
    }

    /// Stamp a payload with the bus sequence and current time, then publish
    pub fn emit(&self, payload: EventPayload) -> usize {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.publish(ExecutionEvent::new(payload, self.clock.now(), sequence))
    }

    pub fn broadcast_agent_updated(&self, agent: &Agent) -> usize {
        self.emit(EventPayload::AgentUpdated(Box::new(agent.clone())))
    }

    pub fn broadcast_agent_output(&self, agent_id: &str, output: &str, sequence: u64) -> usize {
        self.emit(EventPayload::AgentOutput {
            agent_id: agent_id.to_string(),
            output: output.to_string(),
            sequence,
        })
    }

    pub fn broadcast_agent_stopped(&self, agent_id: &str) -> usize {
        self.emit(EventPayload::AgentStopped {
            agent_id: agent_id.to_string(),
        })
    }

    pub fn broadcast_agents_stopped_all(&self, count: usize) -> usize {
        self.emit(EventPayload::AgentsStoppedAll { count })
    }
}
