use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version number for an aggregate, used for optimistic concurrency control.
///
/// Version 0 means "no events". The first event of an aggregate carries
/// version 1 and each later event increments it by exactly 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of an aggregate with no events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) carried by an aggregate's first event.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns this version advanced by `count` events.
    pub fn advanced_by(&self, count: usize) -> Self {
        Self(self.0 + count as i64)
    }

    /// Returns this version rewound by `count` events, never below 0.
    pub fn rewound_by(&self, count: usize) -> Self {
        Self((self.0 - count as i64).max(0))
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A committed (or about to be committed) domain event.
///
/// `event_data` is an immutable JSON snapshot of the fact; its shape is
/// determined by `event_type`. Envelopes are never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Globally unique identifier for this event.
    pub event_id: EventId,

    /// The type of the event (e.g., "ProduceRegistered").
    pub event_type: String,

    /// The aggregate this event belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g., "Produce").
    pub aggregate_type: String,

    /// The event payload.
    pub event_data: serde_json::Value,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,

    /// The version of the aggregate after this event.
    pub version: Version,

    /// Correlation data that is not part of the fact itself.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Creates an envelope stamped with a fresh id and the current time.
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        version: Version,
        event_data: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_data,
            timestamp: Utc::now(),
            version,
            metadata: HashMap::new(),
        }
    }

    /// Returns the envelope with one more metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Creates a builder for envelopes assembled field by field.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Deserializes the event data into a concrete payload type.
    pub fn data<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.event_data)
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    event_data: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the event data from a serializable value.
    pub fn data<T: Serialize>(mut self, data: &T) -> Result<Self, serde_json::Error> {
        self.event_data = Some(serde_json::to_value(data)?);
        Ok(self)
    }

    /// Sets the event data from a raw JSON value.
    pub fn data_raw(mut self, data: serde_json::Value) -> Self {
        self.event_data = Some(data);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the envelope, failing with
    /// [`EventStoreError::IncompleteEnvelope`] when a required field is unset.
    ///
    /// The event id and timestamp are generated when not given.
    pub fn build(self) -> crate::Result<EventEnvelope> {
        fn required<T>(field: Option<T>, name: &'static str) -> crate::Result<T> {
            field.ok_or(EventStoreError::IncompleteEnvelope { missing: name })
        }

        let mut envelope = EventEnvelope::new(
            required(self.aggregate_id, "aggregate_id")?,
            required(self.aggregate_type, "aggregate_type")?,
            required(self.event_type, "event_type")?,
            required(self.version, "version")?,
            required(self.event_data, "event_data")?,
        );
        if let Some(event_id) = self.event_id {
            envelope.event_id = event_id;
        }
        if let Some(timestamp) = self.timestamp {
            envelope.timestamp = timestamp;
        }
        envelope.metadata = self.metadata;
        Ok(envelope)
    }
}
