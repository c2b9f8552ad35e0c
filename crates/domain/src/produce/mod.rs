//! Produce aggregate and related types.

mod aggregate;
mod commands;
pub mod events;
mod handler;
mod value_objects;

pub use aggregate::ProduceAggregate;
pub use commands::*;
pub use events::{
    ProduceDeactivatedData, ProduceEvent, ProducePriceUpdatedData, ProduceQualityUpdatedData,
    ProduceRegisteredData,
};
pub use handler::{ProduceCommandHandler, register_produce_handlers};
pub use value_objects::{FarmerId, Price, ProduceStatus};

use common::AggregateId;
use event_store::Version;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during produce operations.
#[derive(Debug, Error)]
pub enum ProduceError {
    /// Price must be strictly positive.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: i64 },

    /// Only the owning farmer may change the listing.
    #[error("{updater_id} is not allowed to modify produce {produce_id}")]
    Unauthorized {
        produce_id: AggregateId,
        updater_id: String,
    },

    /// The listing's status forbids the operation.
    #[error("Invalid state: cannot {action} produce {produce_id} in {status} state")]
    InvalidState {
        produce_id: AggregateId,
        status: ProduceStatus,
        action: &'static str,
    },

    /// A registration targeted an id that already has history.
    #[error("Produce {0} is already registered")]
    AlreadyRegistered(AggregateId),

    /// Nothing to rebuild from.
    #[error("Cannot rebuild produce from an empty history")]
    EmptyHistory,

    /// The history does not start with a registration.
    #[error("History must start with ProduceRegistered, found {found}")]
    MissingRegistration { found: String },

    /// Versions in the history are not contiguous.
    #[error("History version gap: expected {expected}, found {found}")]
    VersionGap { expected: Version, found: Version },

    /// A stored payload of a known event type could not be decoded.
    #[error("Malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ProduceError {
    /// Maps the error onto its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProduceError::InvalidPrice { .. } => ErrorKind::InvalidPrice,
            ProduceError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ProduceError::InvalidState { .. } | ProduceError::AlreadyRegistered(_) => {
                ErrorKind::InvalidState
            }
            ProduceError::EmptyHistory => ErrorKind::EmptyHistory,
            ProduceError::MissingRegistration { .. }
            | ProduceError::VersionGap { .. }
            | ProduceError::Payload(_) => ErrorKind::CorruptHistory,
        }
    }
}
