use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{Mutex, RwLock};

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{EventStore, EventStream, validate_events_for_append},
};

type AggregateStream = Arc<Mutex<Vec<EventEnvelope>>>;

/// In-memory event store.
///
/// Each aggregate owns its own mutex-guarded stream, so the version check
/// and the write happen under a per-aggregate lock and appends to different
/// aggregates never wait on each other. A separate log keeps global commit
/// order for catch-up.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<AggregateId, AggregateStream>>>,
    log: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
        self.log.write().await.clear();
    }

    async fn existing_stream(&self, aggregate_id: AggregateId) -> Option<AggregateStream> {
        self.streams.read().await.get(&aggregate_id).cloned()
    }

    async fn stream_for(&self, aggregate_id: AggregateId) -> AggregateStream {
        if let Some(stream) = self.existing_stream(aggregate_id).await {
            return stream;
        }
        self.streams
            .write()
            .await
            .entry(aggregate_id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_events_for_append(aggregate_id, expected_version, &events)?;

        let stream = self.stream_for(aggregate_id).await;
        let mut stream = stream.lock().await;

        let actual = Version::new(stream.len() as i64);
        if actual != expected_version {
            tracing::debug!(%aggregate_id, %expected_version, %actual, "append rejected");
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let committed = expected_version.advanced_by(events.len());
        metrics::counter!("events_appended").increment(events.len() as u64);

        // Log order per aggregate follows stream order because the stream lock is still held.
        self.log.write().await.extend(events.iter().cloned());
        stream.extend(events);

        Ok(committed)
    }

    async fn read_events(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<EventStream> {
        let events: Vec<EventEnvelope> = match self.existing_stream(aggregate_id).await {
            Some(stream) => stream
                .lock()
                .await
                .iter()
                .filter(|e| e.version > from_version)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn current_version(&self, aggregate_id: AggregateId) -> Result<Version> {
        let version = match self.existing_stream(aggregate_id).await {
            Some(stream) => Version::new(stream.lock().await.len() as i64),
            None => Version::initial(),
        };
        Ok(version)
    }

    async fn events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        let events = self.log.read().await.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
