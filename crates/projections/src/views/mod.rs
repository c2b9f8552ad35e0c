//! Read model views for the produce query side.

pub mod price_history;
pub mod produce_catalog;

pub use price_history::{PriceHistory, PriceHistoryProjection, PricePoint};
pub use produce_catalog::{ProduceCatalogProjection, ProduceDocument};
