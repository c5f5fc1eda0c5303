//! Per-execution event stream

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::types::Observation;
use crate::clock::SharedClock;
use crate::events::{EventBus, EventPayload, ExecutionEvent};

pub type EventCallback = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Observations kept per phase in the execution record
pub const MAX_OBSERVATIONS_PER_PHASE: usize = 1_000;
/// Longest observation message kept in the execution record
pub const MAX_OBSERVATION_BYTES: usize = 4 * 1024;

#[derive(Default)]
struct PhaseTally {
    kept: usize,
    omitted: usize,
    marker: Option<usize>,
}

/// Recorded observations, capped per phase with one omission marker each
#[derive(Default)]
struct ObservationLog {
    entries: Vec<Observation>,
    phases: HashMap<String, PhaseTally>,
}

impl ObservationLog {
    fn record(&mut self, phase: &str, message: &str, recorded_at: DateTime<Utc>) {
        let tally = self.phases.entry(phase.to_string()).or_default();
        if tally.kept < MAX_OBSERVATIONS_PER_PHASE {
            tally.kept += 1;
            self.entries.push(Observation {
                phase: phase.to_string(),
                message: head_by_bytes(message, MAX_OBSERVATION_BYTES),
                recorded_at,
            });
            return;
        }

        tally.omitted += 1;
        let marker = format!(
            "[... omitted {} further observation(s) for phase {} ...]",
            tally.omitted, phase
        );
        match tally.marker {
            Some(index) => {
                if let Some(entry) = self.entries.get_mut(index) {
                    entry.message = marker;
                    entry.recorded_at = recorded_at;
                }
            }
            None => {
                tally.marker = Some(self.entries.len());
                self.entries.push(Observation {
                    phase: phase.to_string(),
                    message: marker,
                    recorded_at,
                });
            }
        }
    }
}

fn head_by_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Stamps events for one execution and delivers them to the callback first,
/// then to the bus
pub struct ExecutionEmitter {
    execution_id: String,
    sequence: AtomicU64,
    clock: SharedClock,
    bus: Option<Arc<EventBus>>,
    callback: Option<EventCallback>,
    observations: Mutex<ObservationLog>,
}

impl ExecutionEmitter {
    pub fn new(
        execution_id: String,
        clock: SharedClock,
        bus: Option<Arc<EventBus>>,
        callback: Option<EventCallback>,
    ) -> Self {
        Self {
            execution_id,
            sequence: AtomicU64::new(1),
            clock,
            bus,
            callback,
            observations: Mutex::new(ObservationLog::default()),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn emit(&self, payload: EventPayload) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let event = ExecutionEvent::new(payload, self.clock.now(), sequence)
            .for_execution(self.execution_id.clone());

        if let Some(callback) = &self.callback {
            callback(&event);
        }
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }

    /// Record and emit an observation; the stored copy is capped, the event is not
    pub fn observe(&self, phase: &str, message: &str) {
        self.observations
            .lock()
            .record(phase, message, self.clock.now());
        self.emit(EventPayload::Observation {
            phase: phase.to_string(),
            message: message.to_string(),
        });
    }

    pub fn take_observations(&self) -> Vec<Observation> {
        std::mem::take(&mut *self.observations.lock()).entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn emitter() -> ExecutionEmitter {
        ExecutionEmitter::new("exec-1".into(), Arc::new(SystemClock), None, None)
    }

    #[test]
    fn observations_are_capped_per_phase() {
        let emitter = emitter();
        for i in 0..MAX_OBSERVATIONS_PER_PHASE + 25 {
            emitter.observe("unit", &format!("line {}", i));
        }
        emitter.observe("integration", "still recorded");

        let observations = emitter.take_observations();
        assert_eq!(observations.len(), MAX_OBSERVATIONS_PER_PHASE + 2);
        assert_eq!(
            observations[MAX_OBSERVATIONS_PER_PHASE].message,
            "[... omitted 25 further observation(s) for phase unit ...]"
        );
        assert_eq!(observations.last().unwrap().phase, "integration");
        assert!(emitter.take_observations().is_empty());
    }

    #[test]
    fn long_messages_are_truncated_but_events_are_not() {
        let bus = Arc::new(EventBus::new(Arc::new(SystemClock)));
        let mut sub = bus.subscribe(crate::events::EventFilter::All);
        let emitter =
            ExecutionEmitter::new("exec-1".into(), Arc::new(SystemClock), Some(bus.clone()), None);

        let long = "é".repeat(MAX_OBSERVATION_BYTES);
        emitter.observe("unit", &long);

        let stored = &emitter.take_observations()[0].message;
        assert!(stored.len() <= MAX_OBSERVATION_BYTES);
        assert!(long.starts_with(stored.as_str()));
        match sub.try_recv().map(|e| e.payload) {
            Some(EventPayload::Observation { message, .. }) => assert_eq!(message, long),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
