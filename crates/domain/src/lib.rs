//! Write side of the produce core.
//!
//! This crate provides:
//! - [`Aggregate`] and [`DomainEvent`] traits for event-sourced entities
//! - [`Repository`] for loading and saving aggregates through an event store
//! - [`CommandBus`] dispatching commands by kind to exactly one [`CommandHandler`]
//! - the produce aggregate, its events and commands, and [`ProduceCommandHandler`]

pub mod aggregate;
pub mod command;
pub mod error;
pub mod produce;
pub mod publisher;
pub mod repository;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandBus, CommandHandler, CommandOutcome, RetryPolicy};
pub use error::{DomainError, ErrorKind, ErrorResponse};
pub use produce::{
    CommandKind, DeactivateProduce, FarmerId, Price, ProduceAggregate, ProduceCommand,
    ProduceCommandHandler, ProduceDeactivatedData, ProduceError, ProduceEvent,
    ProducePriceUpdatedData, ProduceQualityUpdatedData, ProduceRegisteredData, ProduceStatus,
    RegisterProduce, UpdatePrice, UpdateQuality, register_produce_handlers,
};
pub use publisher::EventPublisher;
pub use repository::Repository;
