//! Application error types.

use domain::{DomainError, ErrorKind, ErrorResponse};
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

/// Errors surfaced by the application layer.
#[derive(Debug, Error)]
pub enum AppError {
    /// The configuration cannot be used.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connecting to the database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A command was rejected.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A read model operation failed.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// A queried read model document does not exist.
    #[error("{collection} document {id} not found")]
    NotFound { collection: &'static str, id: String },

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Installing the log subscriber failed.
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl AppError {
    /// Maps the error onto its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Domain(err) => err.kind(),
            AppError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
                ErrorKind::ConcurrencyConflict
            }
            AppError::NotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// Builds the transport-facing error body.
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            AppError::Domain(err) => ErrorResponse::from(err),
            other => ErrorResponse {
                kind: other.kind(),
                detail: other.to_string(),
                retryable: other.kind() == ErrorKind::ConcurrencyConflict,
            },
        }
    }
}
