//! Loading and saving aggregates through an event store.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{EventEnvelope, EventStore, EventStoreExt};

use crate::aggregate::Aggregate;
use crate::error::DomainError;

/// Event-sourced repository for one aggregate type.
///
/// `load` replays the stored history; `save` appends whatever the aggregate
/// recorded since it was loaded, using the loaded version as the expected
/// version so that a concurrent writer produces a conflict instead of a
/// silent overwrite.
pub struct Repository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Repository<S, A>
where
    S: EventStore,
    A: Aggregate,
    DomainError: From<A::Error>,
{
    /// Creates a new repository over the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate, returning None if it has no events.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let history = self.store.load_events(aggregate_id).await?;
        if history.is_empty() {
            return Ok(None);
        }
        Ok(Some(A::rebuild(history)?))
    }

    /// Appends the aggregate's uncommitted events and returns them.
    ///
    /// Nothing is written when there is nothing pending. On failure the
    /// pending events are dropped; callers retry from a fresh load.
    pub async fn save(&self, aggregate: &mut A) -> Result<Vec<EventEnvelope>, DomainError> {
        let pending = aggregate.take_uncommitted();
        if pending.is_empty() {
            return Ok(pending);
        }

        let expected = aggregate.version().rewound_by(pending.len());
        self.store
            .append(aggregate.id(), expected, pending.clone())
            .await?;

        Ok(pending)
    }
}
