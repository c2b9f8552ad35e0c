//! Domain error types.

use event_store::EventStoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::produce::ProduceError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The produce aggregate rejected the operation.
    #[error("Produce error: {0}")]
    Produce(#[from] ProduceError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// No handler is bound to the command kind.
    #[error("No handler registered for command kind {0}")]
    NoHandlerRegistered(String),

    /// A handler is already bound to the command kind.
    #[error("A handler is already registered for command kind {0}")]
    DuplicateHandler(String),
}

/// Stable discriminator surfaced to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConcurrencyConflict,
    Unauthorized,
    InvalidState,
    InvalidPrice,
    NotFound,
    NoHandlerRegistered,
    EmptyHistory,
    DuplicateHandler,
    CorruptHistory,
    Internal,
}

impl ErrorKind {
    /// Returns the discriminator as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConcurrencyConflict => "ConcurrencyConflict",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::InvalidPrice => "InvalidPrice",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NoHandlerRegistered => "NoHandlerRegistered",
            ErrorKind::EmptyHistory => "EmptyHistory",
            ErrorKind::DuplicateHandler => "DuplicateHandler",
            ErrorKind::CorruptHistory => "CorruptHistory",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainError {
    /// Maps the error onto its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
                ErrorKind::ConcurrencyConflict
            }
            DomainError::EventStore(_) => ErrorKind::Internal,
            DomainError::Produce(err) => err.kind(),
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::NoHandlerRegistered(_) => ErrorKind::NoHandlerRegistered,
            DomainError::DuplicateHandler(_) => ErrorKind::DuplicateHandler,
        }
    }

    /// Only concurrency conflicts can succeed when retried with fresh state.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }
}

/// Error body handed to a transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub detail: String,
    pub retryable: bool,
}

impl From<&DomainError> for ErrorResponse {
    fn from(err: &DomainError) -> Self {
        Self {
            kind: err.kind(),
            detail: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
