//! Price history read model.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::produce::events::{PRODUCE_PRICE_UPDATED, PRODUCE_REGISTERED};
use domain::{DomainEvent, Price, ProduceEvent};
use event_store::{EventEnvelope, Version};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::projection::Projection;
use crate::read_model::ReadModelStore;

/// One recorded price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub version: i64,
    pub price: Price,
    pub changed_by: String,
    pub at: DateTime<Utc>,
}

/// Every price a produce listing has had, ordered by version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    pub id: String,
    pub points: Vec<PricePoint>,
}

impl PriceHistory {
    /// The most recent price, if any was recorded.
    pub fn current_price(&self) -> Option<Price> {
        self.points.last().map(|p| p.price)
    }

    /// Inserts a point unless its version is already present.
    fn record(&mut self, point: PricePoint) -> bool {
        match self.points.binary_search_by_key(&point.version, |p| p.version) {
            Ok(_) => false,
            Err(index) => {
                self.points.insert(index, point);
                true
            }
        }
    }
}

/// Maintains the `price_history` collection.
///
/// Points are keyed by version, so redelivery and reordering are harmless.
/// Each event is a read-modify-write of the whole document; concurrent
/// calls for one produce must be serialized, which [`ProjectionProcessor`]
/// does per aggregate.
///
/// [`ProjectionProcessor`]: crate::ProjectionProcessor
#[derive(Clone)]
pub struct PriceHistoryProjection {
    store: Arc<dyn ReadModelStore>,
}

impl PriceHistoryProjection {
    /// Collection the documents are written to.
    pub const COLLECTION: &'static str = "price_history";

    /// Creates a projection writing to the given store.
    pub fn new(store: Arc<dyn ReadModelStore>) -> Self {
        Self { store }
    }

    /// Fetches the price history of one produce.
    pub async fn history(&self, produce_id: &str) -> Result<Option<PriceHistory>> {
        match self.store.get(Self::COLLECTION, produce_id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Projection for PriceHistoryProjection {
    fn name(&self) -> &'static str {
        "PriceHistoryProjection"
    }

    fn subscribed_to(&self) -> &'static [&'static str] {
        &[PRODUCE_REGISTERED, PRODUCE_PRICE_UPDATED]
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let (price, changed_by) = match ProduceEvent::decode(&event.event_type, &event.event_data)? {
            Some(ProduceEvent::Registered(data)) if event.version == Version::first() => {
                (data.initial_price, data.farmer_id.to_string())
            }
            Some(ProduceEvent::PriceUpdated(data)) => (data.new_price, data.updater_id),
            _ => return Ok(()),
        };

        let id = event.aggregate_id.to_string();
        let mut history = self.history(&id).await?.unwrap_or_else(|| PriceHistory {
            id: id.clone(),
            points: Vec::new(),
        });

        let recorded = history.record(PricePoint {
            version: event.version.as_i64(),
            price,
            changed_by,
            at: event.timestamp,
        });
        if !recorded {
            return Ok(());
        }

        self.store
            .save(Self::COLLECTION, &id, serde_json::to_value(&history)?)
            .await
    }

    async fn reset(&self) -> Result<()> {
        self.store.clear(Self::COLLECTION).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryReadModelStore;
    use common::AggregateId;

    fn make_envelope(aggregate_id: AggregateId, version: i64, event: &ProduceEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Produce")
            .event_type(event.event_type())
            .version(Version::new(version))
            .data_raw(event.event_data().unwrap())
            .build()
            .unwrap()
    }

    fn price_change(id: AggregateId, version: i64, old: i64, new: i64) -> EventEnvelope {
        make_envelope(
            id,
            version,
            &ProduceEvent::price_updated(Price::new(old), Price::new(new), "farmer-1"),
        )
    }

    #[tokio::test]
    async fn records_registration_and_changes() {
        let view = PriceHistoryProjection::new(Arc::new(InMemoryReadModelStore::new()));
        let id = AggregateId::new();

        view.handle(&make_envelope(
            id,
            1,
            &ProduceEvent::registered(id, "farmer-1".into(), "CA", "Grade A", Price::new(150)),
        ))
        .await
        .unwrap();
        view.handle(&price_change(id, 2, 150, 160)).await.unwrap();
        view.handle(&price_change(id, 4, 160, 120)).await.unwrap();

        let history = view.history(&id.to_string()).await.unwrap().unwrap();
        let prices: Vec<i64> = history.points.iter().map(|p| p.price.minor_units()).collect();
        assert_eq!(prices, vec![150, 160, 120]);
        assert_eq!(history.current_price(), Some(Price::new(120)));
        assert_eq!(history.points[0].changed_by, "farmer-1");
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let view = PriceHistoryProjection::new(Arc::new(InMemoryReadModelStore::new()));
        let id = AggregateId::new();
        let change = price_change(id, 2, 150, 160);

        view.handle(&change).await.unwrap();
        view.handle(&change).await.unwrap();

        let history = view.history(&id.to_string()).await.unwrap().unwrap();
        assert_eq!(history.points.len(), 1);
    }

    #[tokio::test]
    async fn out_of_order_delivery_keeps_version_order() {
        let view = PriceHistoryProjection::new(Arc::new(InMemoryReadModelStore::new()));
        let id = AggregateId::new();

        view.handle(&price_change(id, 3, 160, 170)).await.unwrap();
        view.handle(&price_change(id, 2, 150, 160)).await.unwrap();

        let history = view.history(&id.to_string()).await.unwrap().unwrap();
        let versions: Vec<i64> = history.points.iter().map(|p| p.version).collect();
        assert_eq!(versions, vec![2, 3]);
        assert_eq!(history.current_price(), Some(Price::new(170)));
    }

    #[tokio::test]
    async fn repeated_registration_adds_no_point() {
        let view = PriceHistoryProjection::new(Arc::new(InMemoryReadModelStore::new()));
        let id = AggregateId::new();

        for (version, price) in [(1, 150), (3, 90)] {
            view.handle(&make_envelope(
                id,
                version,
                &ProduceEvent::registered(id, "farmer-1".into(), "CA", "Grade A", Price::new(price)),
            ))
            .await
            .unwrap();
        }

        let history = view.history(&id.to_string()).await.unwrap().unwrap();
        assert_eq!(history.points.len(), 1);
        assert_eq!(history.current_price(), Some(Price::new(150)));
    }

    #[tokio::test]
    async fn missing_history_is_none() {
        let view = PriceHistoryProjection::new(Arc::new(InMemoryReadModelStore::new()));
        assert!(view.history("nope").await.unwrap().is_none());
    }
}
