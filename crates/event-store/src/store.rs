use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::TryStreamExt;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// A stream of events.
///
/// Streams returned by [`EventStore::read_events`] are finite; calling
/// `read_events` again starts a fresh pass over the same events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store owns the durable, append-only sequence of events for
/// every aggregate. All implementations must be thread-safe (Send + Sync)
/// and must honor the same append/read contract.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events for one aggregate.
    ///
    /// Fails with `ConcurrencyConflict` unless the persisted version equals
    /// `expected_version` at the moment of the append. The version check and
    /// the write are atomic with respect to other appends for the same
    /// aggregate, and the batch is stored all-or-nothing.
    ///
    /// Returns the committed version, `expected_version + events.len()`.
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version>;

    /// Streams the events of an aggregate whose version is greater than
    /// `from_version`, in ascending version order.
    async fn read_events(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<EventStream>;

    /// Returns the persisted version of an aggregate, `Version::initial()`
    /// if it has no events.
    async fn current_version(&self, aggregate_id: AggregateId) -> Result<Version>;

    /// Retrieves every event of the given type, in insertion order.
    async fn events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;

    /// Streams all events in the store in insertion order.
    ///
    /// Per-aggregate order is always by version. Across aggregates, a
    /// backend may miss appends that commit while the stream is open.
    async fn stream_all_events(&self) -> Result<EventStream>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Collects the full history of an aggregate.
    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        self.read_events(aggregate_id, Version::initial())
            .await?
            .try_collect()
            .await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.current_version(aggregate_id).await? > Version::initial())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks the shape of a batch before it is appended.
///
/// Every event must target `aggregate_id` and the versions must run
/// `expected_version + 1 ..= expected_version + events.len()` without gaps.
pub fn validate_events_for_append(
    aggregate_id: AggregateId,
    expected_version: Version,
    events: &[EventEnvelope],
) -> Result<()> {
    let invalid = |reason: String| EventStoreError::InvalidAppend {
        aggregate_id,
        reason,
    };

    if events.is_empty() {
        return Err(invalid("cannot append an empty event list".to_string()));
    }

    let mut version = expected_version;
    for event in events {
        if event.aggregate_id != aggregate_id {
            return Err(invalid(format!(
                "event {} belongs to aggregate {}",
                event.event_id, event.aggregate_id
            )));
        }
        if event.aggregate_type != events[0].aggregate_type {
            return Err(invalid(
                "all events must have the same aggregate type".to_string(),
            ));
        }
        version = version.next();
        if event.version != version {
            return Err(invalid(format!(
                "event versions must be sequential: expected {}, got {}",
                version, event.version
            )));
        }
    }

    Ok(())
}
