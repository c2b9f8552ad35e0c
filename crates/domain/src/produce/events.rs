//! Produce domain events.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{FarmerId, Price, ProduceStatus};

pub const PRODUCE_REGISTERED: &str = "ProduceRegistered";
pub const PRODUCE_QUALITY_UPDATED: &str = "ProduceQualityUpdated";
pub const PRODUCE_PRICE_UPDATED: &str = "ProducePriceUpdated";
pub const PRODUCE_DEACTIVATED: &str = "ProduceDeactivated";

/// Events that can occur on a produce aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum ProduceEvent {
    /// Produce was registered by a farmer.
    Registered(ProduceRegisteredData),

    /// Produce quality grade changed.
    QualityUpdated(ProduceQualityUpdatedData),

    /// Produce price changed.
    PriceUpdated(ProducePriceUpdatedData),

    /// Produce was taken off the market.
    Deactivated(ProduceDeactivatedData),
}

impl DomainEvent for ProduceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProduceEvent::Registered(_) => PRODUCE_REGISTERED,
            ProduceEvent::QualityUpdated(_) => PRODUCE_QUALITY_UPDATED,
            ProduceEvent::PriceUpdated(_) => PRODUCE_PRICE_UPDATED,
            ProduceEvent::Deactivated(_) => PRODUCE_DEACTIVATED,
        }
    }

    fn event_data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            ProduceEvent::Registered(data) => serde_json::to_value(data),
            ProduceEvent::QualityUpdated(data) => serde_json::to_value(data),
            ProduceEvent::PriceUpdated(data) => serde_json::to_value(data),
            ProduceEvent::Deactivated(data) => serde_json::to_value(data),
        }
    }

    fn decode(
        event_type: &str,
        data: &serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let event = match event_type {
            PRODUCE_REGISTERED => ProduceEvent::Registered(ProduceRegisteredData::deserialize(data)?),
            PRODUCE_QUALITY_UPDATED => {
                ProduceEvent::QualityUpdated(ProduceQualityUpdatedData::deserialize(data)?)
            }
            PRODUCE_PRICE_UPDATED => {
                ProduceEvent::PriceUpdated(ProducePriceUpdatedData::deserialize(data)?)
            }
            PRODUCE_DEACTIVATED => {
                ProduceEvent::Deactivated(ProduceDeactivatedData::deserialize(data)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Data for ProduceRegistered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRegisteredData {
    /// The produce being registered.
    pub produce_id: AggregateId,

    /// The farmer who owns the listing.
    pub farmer_id: FarmerId,

    /// Where the produce comes from.
    pub origin: String,

    /// Initial quality grade.
    pub quality: String,

    /// Initial asking price.
    pub initial_price: Price,
}

/// Data for ProduceQualityUpdated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceQualityUpdatedData {
    pub old_quality: String,
    pub new_quality: String,
    pub updater_id: String,
}

/// Data for ProducePriceUpdated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducePriceUpdatedData {
    pub old_price: Price,
    pub new_price: Price,
    pub updater_id: String,
}

/// Data for ProduceDeactivated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceDeactivatedData {
    /// Status the listing had before it was deactivated.
    pub previous_status: ProduceStatus,
}

impl ProduceEvent {
    /// Creates a ProduceRegistered event.
    pub fn registered(
        produce_id: AggregateId,
        farmer_id: FarmerId,
        origin: impl Into<String>,
        quality: impl Into<String>,
        initial_price: Price,
    ) -> Self {
        ProduceEvent::Registered(ProduceRegisteredData {
            produce_id,
            farmer_id,
            origin: origin.into(),
            quality: quality.into(),
            initial_price,
        })
    }

    /// Creates a ProduceQualityUpdated event.
    pub fn quality_updated(
        old_quality: impl Into<String>,
        new_quality: impl Into<String>,
        updater_id: impl Into<String>,
    ) -> Self {
        ProduceEvent::QualityUpdated(ProduceQualityUpdatedData {
            old_quality: old_quality.into(),
            new_quality: new_quality.into(),
            updater_id: updater_id.into(),
        })
    }

    /// Creates a ProducePriceUpdated event.
    pub fn price_updated(old_price: Price, new_price: Price, updater_id: impl Into<String>) -> Self {
        ProduceEvent::PriceUpdated(ProducePriceUpdatedData {
            old_price,
            new_price,
            updater_id: updater_id.into(),
        })
    }

    /// Creates a ProduceDeactivated event.
    pub fn deactivated(previous_status: ProduceStatus) -> Self {
        ProduceEvent::Deactivated(ProduceDeactivatedData { previous_status })
    }
}
