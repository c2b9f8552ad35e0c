//! Projection error types.

use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// The read model database failed.
    #[error("Read model database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to (de)serialize an event payload or a document.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Read model documents must be JSON objects.
    #[error("Document {id} in {collection} is not a JSON object")]
    InvalidDocument { collection: String, id: String },

    /// An event arrived for a document that was never created.
    #[error("No {collection} document for {id} to apply {event_type} to")]
    MissingDocument {
        collection: &'static str,
        id: String,
        event_type: String,
    },

    /// No projection with this name is registered.
    #[error("Unknown projection: {0}")]
    UnknownProjection(String),

    /// An event skipped past versions the document has not seen yet.
    #[error("{collection} document {id} is at version {stored}, cannot apply version {found}")]
    VersionGap {
        collection: &'static str,
        id: String,
        stored: i64,
        found: i64,
    },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
