//! Projection processor for feeding events to projections.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::EventPublisher;
use event_store::{EventEnvelope, EventStore, Version};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::projection::Projection;
use crate::{ProjectionError, Result};

type Cursor = Arc<Mutex<Version>>;

/// Delivers events to the projections subscribed to their type.
///
/// The processor supports:
/// - Live delivery: committed batches arrive through [`EventPublisher`]
/// - Catch-up: replays every stored event in log order
/// - Rebuild: resets all projections and replays from scratch
///
/// Delivery is serialized per aggregate and follows version order. Each
/// aggregate has a cursor holding the last version handed to the
/// projections; an event that skips ahead of it pulls the missing events
/// from the store first, and an event at or below it is dropped. Publishers
/// may therefore call in any order and concurrently.
///
/// A projection that fails on an event is logged and skipped; the other
/// projections still receive it and the write path is never affected.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
    cursors: Mutex<HashMap<AggregateId, Cursor>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        tracing::debug!(projection = projection.name(), "projection registered");
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    async fn cursor(&self, aggregate_id: AggregateId) -> Cursor {
        self.cursors
            .lock()
            .await
            .entry(aggregate_id)
            .or_default()
            .clone()
    }

    /// Delivers a committed event once every earlier event of its aggregate
    /// has been delivered.
    ///
    /// Returns how many projection failures the delivery caused.
    #[tracing::instrument(
        skip(self, event),
        fields(aggregate_id = %event.aggregate_id, version = %event.version)
    )]
    pub async fn deliver(&self, event: &EventEnvelope) -> Result<usize> {
        let cursor = self.cursor(event.aggregate_id).await;
        let mut delivered = cursor.lock().await;

        if event.version <= *delivered {
            return Ok(0);
        }
        if event.version == delivered.next() {
            let failures = self.process_event(event).await;
            *delivered = event.version;
            return Ok(failures);
        }

        let from = *delivered;
        tracing::debug!(%from, "events missing before this one, reading store");
        let mut failures = 0;
        let mut missing = self.store.read_events(event.aggregate_id, from).await?;
        while let Some(result) = missing.next().await {
            let stored = result?;
            failures += self.process_event(&stored).await;
            *delivered = stored.version;
        }

        if *delivered < event.version {
            let reached = *delivered;
            tracing::warn!(%reached, "published event is not in the store, skipping");
        }
        Ok(failures)
    }

    /// Hands one event to every subscribed projection, without ordering.
    ///
    /// A projection that reports a version gap is caught up from the store
    /// first. Returns how many projections failed on the event.
    #[tracing::instrument(
        skip(self, event),
        fields(event_type = %event.event_type, aggregate_id = %event.aggregate_id, version = %event.version)
    )]
    pub async fn process_event(&self, event: &EventEnvelope) -> usize {
        let mut failures = 0;

        for projection in &self.projections {
            if !projection.is_subscribed(&event.event_type) {
                continue;
            }
            match self.apply(projection.as_ref(), event).await {
                Ok(()) => {
                    metrics::counter!("projections_events_processed", "projection" => projection.name())
                        .increment(1);
                }
                Err(err) => {
                    failures += 1;
                    metrics::counter!("projection_failures", "projection" => projection.name())
                        .increment(1);
                    tracing::warn!(
                        projection = projection.name(),
                        error = %err,
                        "projection failed, skipping event"
                    );
                }
            }
        }

        failures
    }

    async fn apply(&self, projection: &dyn Projection, event: &EventEnvelope) -> Result<()> {
        match projection.handle(event).await {
            Err(ProjectionError::VersionGap { stored, .. }) => {
                self.replay_into(projection, event, Version::new(stored))
                    .await
            }
            other => other,
        }
    }

    /// Feeds one projection every stored event after `from` up to and
    /// including `event`, subscribed or not, so it can track versions.
    async fn replay_into(
        &self,
        projection: &dyn Projection,
        event: &EventEnvelope,
        from: Version,
    ) -> Result<()> {
        tracing::debug!(projection = projection.name(), %from, "projection behind, replaying");
        let mut history = self.store.read_events(event.aggregate_id, from).await?;
        while let Some(result) = history.next().await {
            let stored = result?;
            if stored.version > event.version {
                break;
            }
            projection.handle(&stored).await?;
        }
        Ok(())
    }

    /// Replays every stored event, in log order, through the projections.
    ///
    /// Events already delivered by this processor are skipped. Returns the
    /// number of events read from the store.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut stream = self.store.stream_all_events().await?;
        let mut events: u64 = 0;
        let mut failures: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            events += 1;
            failures += self.deliver(&event).await? as u64;
        }

        tracing::info!(events, failures, "catch-up complete");

        Ok(events)
    }

    /// Resets one projection and refills it from the event types it
    /// subscribes to.
    ///
    /// Other projections are left alone. Events are fed in version order;
    /// the rebuild is not coordinated with live delivery, so run it while
    /// no commands are flowing. Returns the number of events replayed.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_projection(&self, name: &str) -> Result<u64> {
        let projection = self
            .projections
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| ProjectionError::UnknownProjection(name.to_string()))?;

        projection.reset().await?;

        let mut events = Vec::new();
        for event_type in projection.subscribed_to() {
            events.extend(self.store.events_by_type(event_type).await?);
        }
        events.sort_by_key(|e| e.version);

        for event in &events {
            if let Err(err) = self.apply(projection.as_ref(), event).await {
                metrics::counter!("projection_failures", "projection" => projection.name())
                    .increment(1);
                tracing::warn!(projection = name, error = %err, "projection failed, skipping event");
            }
        }

        tracing::info!(projection = name, events = events.len(), "projection rebuilt");
        Ok(events.len() as u64)
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.cursors.lock().await.clear();
        self.run_catch_up().await
    }
}

#[async_trait]
impl<S: EventStore> EventPublisher for ProjectionProcessor<S> {
    async fn publish(&self, events: &[EventEnvelope]) {
        for event in events {
            if let Err(err) = self.deliver(event).await {
                tracing::warn!(
                    aggregate_id = %event.aggregate_id,
                    version = %event.version,
                    error = %err,
                    "projection delivery failed"
                );
            }
        }
    }
}
