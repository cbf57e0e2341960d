//! Engine event bus — trait for emitting lifecycle events from any module.
//!
//! Modules accept an `Arc<dyn EventSink>` to emit events toward whatever
//! analytics or audit pipeline the host application wires up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Lifecycle events emitted by the sequencing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SequenceStarted,
    MessageSent,
    DeliveryRetried,
    JobFailed,
    JobsPurged,
}

/// A single engine lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub entity_id: Option<String>,
    pub sequence_id: Option<String>,
    pub job_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

/// Trait for emitting engine events. Implementations route events to an
/// analytics store, a message bus, or customer webhooks.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating an `EngineEvent` with minimal boilerplate.
pub fn make_event(
    event_type: EventType,
    entity_id: Option<String>,
    sequence_id: Option<String>,
    job_id: Option<Uuid>,
) -> EngineEvent {
    EngineEvent {
        event_id: Uuid::new_v4(),
        event_type,
        entity_id,
        sequence_id,
        job_id,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        sink.emit(make_event(
            EventType::SequenceStarted,
            Some("lead-1".into()),
            Some("trial-nurture".into()),
            None,
        ));
        sink.emit(make_event(
            EventType::MessageSent,
            Some("lead-1".into()),
            Some("trial-nurture".into()),
            Some(Uuid::new_v4()),
        ));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_type(EventType::SequenceStarted), 1);
        assert_eq!(sink.count_type(EventType::MessageSent), 1);

        let events = sink.events();
        assert_eq!(events[0].entity_id, Some("lead-1".into()));
        assert!(events[1].job_id.is_some());
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        // Should not panic
        sink.emit(make_event(EventType::JobFailed, None, None, None));
    }
}
