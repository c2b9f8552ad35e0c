//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::{EventEnvelope, Version};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and named in past tense. The event type travels next
/// to the payload in the envelope, so an event knows how to split itself
/// into the two and how to come back from them.
pub trait DomainEvent: Send + Sync + Clone + Sized {
    /// Returns the event type name stored on the envelope.
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload.
    fn event_data(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Decodes a stored payload.
    ///
    /// Returns `Ok(None)` for event types this domain does not know about,
    /// so histories written by newer code can still be replayed.
    fn decode(event_type: &str, data: &serde_json::Value)
    -> Result<Option<Self>, serde_json::Error>;
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is the consistency boundary for a single entity. Its state
/// is only ever changed by events: operations validate against current state,
/// record new events as uncommitted, and apply them immediately. Loading is a
/// replay of the persisted history.
pub trait Aggregate: Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    fn id(&self) -> AggregateId;

    /// Returns the version of the last event applied, committed or not.
    fn version(&self) -> Version;

    /// Returns events recorded since the aggregate was loaded or last saved.
    fn uncommitted(&self) -> &[EventEnvelope];

    /// Drains the uncommitted events.
    fn take_uncommitted(&mut self) -> Vec<EventEnvelope>;

    /// Reconstructs state from a complete, ordered history.
    fn rebuild(history: Vec<EventEnvelope>) -> Result<Self, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum TestEvent {
        Created { name: String },
        Renamed { name: String },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Renamed { .. } => "TestRenamed",
            }
        }

        fn event_data(&self) -> Result<serde_json::Value, serde_json::Error> {
            serde_json::to_value(self)
        }

        fn decode(
            event_type: &str,
            data: &serde_json::Value,
        ) -> Result<Option<Self>, serde_json::Error> {
            match event_type {
                "TestCreated" | "TestRenamed" => serde_json::from_value(data.clone()).map(Some),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_domain_event_type() {
        let event = TestEvent::Created {
            name: "test".to_string(),
        };
        assert_eq!(event.event_type(), "TestCreated");

        let event = TestEvent::Renamed {
            name: "other".to_string(),
        };
        assert_eq!(event.event_type(), "TestRenamed");
    }

    #[test]
    fn test_decode_known_and_unknown() {
        let event = TestEvent::Renamed {
            name: "x".to_string(),
        };
        let data = event.event_data().unwrap();

        let decoded = TestEvent::decode("TestRenamed", &data).unwrap();
        assert_eq!(decoded, Some(event));

        let unknown = TestEvent::decode("SomethingElse", &data).unwrap();
        assert!(unknown.is_none());
    }
}
