//! Produce catalog read model: one denormalized document per produce.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::produce::events::{
    PRODUCE_DEACTIVATED, PRODUCE_PRICE_UPDATED, PRODUCE_QUALITY_UPDATED, PRODUCE_REGISTERED,
};
use domain::{DomainEvent, FarmerId, Price, ProduceEvent, ProduceStatus};
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};

use crate::projection::Projection;
use crate::read_model::{FieldFilter, ReadModelStore};
use crate::{ProjectionError, Result};

/// Catalog entry for one produce listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceDocument {
    pub id: String,
    pub farmer_id: FarmerId,
    pub origin: String,
    pub quality: String,
    pub initial_price: Price,
    pub current_price: Price,
    pub status: ProduceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Version of the last event folded into this document.
    pub version: i64,
}

/// Maintains the `produces` collection.
///
/// Every event rewrites the full document. Events at or below the stored
/// version are ignored, so redelivery is harmless and the document never
/// moves backwards. An event more than one version ahead of the document is
/// refused with [`ProjectionError::VersionGap`] rather than folded onto a
/// stale base; the processor answers that by replaying the missing events.
#[derive(Clone)]
pub struct ProduceCatalogProjection {
    store: Arc<dyn ReadModelStore>,
}

impl ProduceCatalogProjection {
    /// Collection the documents are written to.
    pub const COLLECTION: &'static str = "produces";

    /// Creates a projection writing to the given store.
    pub fn new(store: Arc<dyn ReadModelStore>) -> Self {
        Self { store }
    }

    /// Fetches the catalog entry of one produce.
    pub async fn get(&self, produce_id: &str) -> Result<Option<ProduceDocument>> {
        self.store
            .get(Self::COLLECTION, produce_id)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Lists the produce owned by a farmer.
    pub async fn by_farmer(&self, farmer_id: &FarmerId) -> Result<Vec<ProduceDocument>> {
        let filter = FieldFilter::new().with_field("farmerId", farmer_id.as_str());
        self.store
            .find(Self::COLLECTION, &filter)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }

    async fn write(&self, document: &ProduceDocument) -> Result<()> {
        self.store
            .save(Self::COLLECTION, &document.id, serde_json::to_value(document)?)
            .await
    }
}

#[async_trait]
impl Projection for ProduceCatalogProjection {
    fn name(&self) -> &'static str {
        "ProduceCatalogProjection"
    }

    fn subscribed_to(&self) -> &'static [&'static str] {
        &[
            PRODUCE_REGISTERED,
            PRODUCE_QUALITY_UPDATED,
            PRODUCE_PRICE_UPDATED,
            PRODUCE_DEACTIVATED,
        ]
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let id = event.aggregate_id.to_string();
        let version = event.version.as_i64();
        let existing = self.get(&id).await?;
        let stored = existing.as_ref().map_or(0, |doc| doc.version);

        if stored >= version {
            tracing::debug!(%id, version, stored, "stale event, skipping");
            return Ok(());
        }
        if version > stored + 1 {
            return Err(ProjectionError::VersionGap {
                collection: Self::COLLECTION,
                id,
                stored,
                found: version,
            });
        }

        let Some(produce_event) = ProduceEvent::decode(&event.event_type, &event.event_data)?
        else {
            // Unknown types still move the document to their version.
            return match existing {
                Some(mut doc) => {
                    doc.updated_at = event.timestamp;
                    doc.version = version;
                    self.write(&doc).await
                }
                None => Ok(()),
            };
        };

        let document = match (produce_event, existing) {
            (ProduceEvent::Registered(data), None) => ProduceDocument {
                id,
                farmer_id: data.farmer_id,
                origin: data.origin,
                quality: data.quality,
                initial_price: data.initial_price,
                current_price: data.initial_price,
                status: ProduceStatus::Registered,
                created_at: event.timestamp,
                updated_at: event.timestamp,
                version,
            },
            (_, None) => {
                return Err(ProjectionError::MissingDocument {
                    collection: Self::COLLECTION,
                    id,
                    event_type: event.event_type.clone(),
                });
            }
            (change, Some(mut doc)) => {
                match change {
                    ProduceEvent::QualityUpdated(data) => doc.quality = data.new_quality,
                    ProduceEvent::PriceUpdated(data) => doc.current_price = data.new_price,
                    ProduceEvent::Deactivated(_) => doc.status = ProduceStatus::Inactive,
                    // A repeated registration only advances the version.
                    ProduceEvent::Registered(_) => {}
                }
                doc.updated_at = event.timestamp;
                doc.version = version;
                doc
            }
        };

        self.write(&document).await
    }

    async fn reset(&self) -> Result<()> {
        self.store.clear(Self::COLLECTION).await
    }
}
