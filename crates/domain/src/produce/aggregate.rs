//! Produce aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};

use super::{FarmerId, Price, ProduceError, ProduceEvent, ProduceRegisteredData, ProduceStatus};

/// Produce aggregate root.
///
/// Created by [`ProduceAggregate::register`] or rebuilt from history. Every
/// operation validates first and records exactly one event on success, so a
/// rejected operation leaves the aggregate untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceAggregate {
    id: AggregateId,
    farmer_id: FarmerId,
    origin: String,
    quality: String,
    initial_price: Price,
    current_price: Price,
    status: ProduceStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: Version,
    #[serde(skip)]
    uncommitted: Vec<EventEnvelope>,
}

impl ProduceAggregate {
    /// Aggregate type name stored on every envelope.
    pub const AGGREGATE_TYPE: &'static str = "Produce";

    /// Registers new produce under a fresh id.
    pub fn register(
        farmer_id: FarmerId,
        origin: impl Into<String>,
        quality: impl Into<String>,
        initial_price: Price,
    ) -> Result<Self, ProduceError> {
        Self::register_with_id(AggregateId::new(), farmer_id, origin, quality, initial_price)
    }

    /// Registers new produce under a caller-chosen id.
    pub fn register_with_id(
        id: AggregateId,
        farmer_id: FarmerId,
        origin: impl Into<String>,
        quality: impl Into<String>,
        initial_price: Price,
    ) -> Result<Self, ProduceError> {
        if !initial_price.is_positive() {
            return Err(ProduceError::InvalidPrice {
                price: initial_price.minor_units(),
            });
        }

        let data = ProduceRegisteredData {
            produce_id: id,
            farmer_id,
            origin: origin.into(),
            quality: quality.into(),
            initial_price,
        };
        let envelope = Self::envelope(id, Version::first(), &ProduceEvent::Registered(data.clone()))?;

        let mut produce = Self::seed(id, &data, envelope.timestamp);
        produce.uncommitted.push(envelope);

        Ok(produce)
    }

    // Getters

    pub fn farmer_id(&self) -> &FarmerId {
        &self.farmer_id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn quality(&self) -> &str {
        &self.quality
    }

    pub fn initial_price(&self) -> Price {
        self.initial_price
    }

    pub fn current_price(&self) -> Price {
        self.current_price
    }

    pub fn status(&self) -> ProduceStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Operations

    /// Changes the quality grade. Only the owning farmer may do this.
    pub fn update_quality(
        &mut self,
        new_quality: impl Into<String>,
        updater_id: &str,
    ) -> Result<(), ProduceError> {
        if updater_id != self.farmer_id.as_str() {
            return Err(ProduceError::Unauthorized {
                produce_id: self.id,
                updater_id: updater_id.to_string(),
            });
        }
        self.ensure_mutable("update quality")?;

        let event = ProduceEvent::quality_updated(self.quality.clone(), new_quality, updater_id);
        self.record(event)
    }

    /// Changes the current price.
    pub fn update_price(&mut self, new_price: Price, updater_id: &str) -> Result<(), ProduceError> {
        self.ensure_mutable("update price")?;
        if !new_price.is_positive() {
            return Err(ProduceError::InvalidPrice {
                price: new_price.minor_units(),
            });
        }

        let event = ProduceEvent::price_updated(self.current_price, new_price, updater_id);
        self.record(event)
    }

    /// Takes the produce off the market. Repeating it records nothing.
    pub fn deactivate(&mut self) -> Result<(), ProduceError> {
        if self.status == ProduceStatus::Inactive {
            return Ok(());
        }
        self.record(ProduceEvent::deactivated(self.status))
    }

    // Internals

    fn ensure_mutable(&self, action: &'static str) -> Result<(), ProduceError> {
        if self.status.is_mutable() {
            Ok(())
        } else {
            Err(ProduceError::InvalidState {
                produce_id: self.id,
                status: self.status,
                action,
            })
        }
    }

    fn envelope(
        id: AggregateId,
        version: Version,
        event: &ProduceEvent,
    ) -> Result<EventEnvelope, ProduceError> {
        Ok(EventEnvelope::new(
            id,
            Self::AGGREGATE_TYPE,
            event.event_type(),
            version,
            event.event_data()?,
        ))
    }

    fn seed(id: AggregateId, data: &ProduceRegisteredData, at: DateTime<Utc>) -> Self {
        Self {
            id,
            farmer_id: data.farmer_id.clone(),
            origin: data.origin.clone(),
            quality: data.quality.clone(),
            initial_price: data.initial_price,
            current_price: data.initial_price,
            status: ProduceStatus::Registered,
            created_at: at,
            updated_at: at,
            version: Version::first(),
            uncommitted: Vec::new(),
        }
    }

    fn record(&mut self, event: ProduceEvent) -> Result<(), ProduceError> {
        let envelope = Self::envelope(self.id, self.version.next(), &event)?;
        self.apply(&event);
        self.advance_to(&envelope);
        self.uncommitted.push(envelope);
        Ok(())
    }

    fn apply(&mut self, event: &ProduceEvent) {
        match event {
            // Identity is fixed by the first event
            ProduceEvent::Registered(_) => {}
            ProduceEvent::QualityUpdated(data) => {
                self.quality = data.new_quality.clone();
            }
            ProduceEvent::PriceUpdated(data) => {
                self.current_price = data.new_price;
            }
            ProduceEvent::Deactivated(_) => {
                self.status = ProduceStatus::Inactive;
            }
        }
    }

    fn advance_to(&mut self, envelope: &EventEnvelope) {
        self.version = envelope.version;
        self.updated_at = envelope.timestamp;
    }
}

impl Aggregate for ProduceAggregate {
    type Event = ProduceEvent;
    type Error = ProduceError;

    fn aggregate_type() -> &'static str {
        Self::AGGREGATE_TYPE
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn uncommitted(&self) -> &[EventEnvelope] {
        &self.uncommitted
    }

    fn take_uncommitted(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.uncommitted)
    }

    fn rebuild(history: Vec<EventEnvelope>) -> Result<Self, ProduceError> {
        let mut history = history.into_iter();
        let first = history.next().ok_or(ProduceError::EmptyHistory)?;

        if first.version != Version::first() {
            return Err(ProduceError::VersionGap {
                expected: Version::first(),
                found: first.version,
            });
        }
        let Some(ProduceEvent::Registered(data)) =
            ProduceEvent::decode(&first.event_type, &first.event_data)?
        else {
            return Err(ProduceError::MissingRegistration {
                found: first.event_type,
            });
        };

        let mut produce = Self::seed(first.aggregate_id, &data, first.timestamp);

        for envelope in history {
            let expected = produce.version.next();
            if envelope.version != expected {
                return Err(ProduceError::VersionGap {
                    expected,
                    found: envelope.version,
                });
            }

            match ProduceEvent::decode(&envelope.event_type, &envelope.event_data)? {
                Some(event) => produce.apply(&event),
                None => tracing::debug!(
                    aggregate_id = %produce.id,
                    event_type = %envelope.event_type,
                    "skipping unknown event type"
                ),
            }
            produce.advance_to(&envelope);
        }

        Ok(produce)
    }
}
