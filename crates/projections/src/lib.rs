//! Read models and projections for the produce query side.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`ReadModelStore`] keyed JSON document storage, in memory or in PostgreSQL
//! - [`Projection`] trait for turning committed events into documents
//! - [`ProjectionProcessor`] routing events to projections by event type
//! - Two views: the produce catalog and per-produce price history
//! - [`ChannelNotifier`] forwarding committed events to a ledger consumer

pub mod error;
pub mod memory;
pub mod notifier;
pub mod postgres;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use memory::InMemoryReadModelStore;
pub use notifier::ChannelNotifier;
pub use postgres::PostgresReadModelStore;
pub use processor::ProjectionProcessor;
pub use projection::Projection;
pub use read_model::{FieldFilter, ReadModelStore};
pub use views::{
    PriceHistory, PriceHistoryProjection, PricePoint, ProduceCatalogProjection, ProduceDocument,
};
