//! Append-only event storage.
//!
//! - [`EventEnvelope`] is the persisted form of a domain event
//! - [`EventStore`] is the storage contract, with optimistic concurrency on append
//! - [`InMemoryEventStore`] backs tests and single-process deployments
//! - [`PostgresEventStore`] is the table-backed implementation of the same contract

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{EventStore, EventStoreExt, EventStream};
