//! Wiring for the produce event-sourcing core.
//!
//! [`Application`] owns the command bus, the projection processor and the
//! read model store, connected the same way for every storage backend.
//! Transports sit on top of [`Application::send`] and the query methods.

pub mod config;
pub mod error;
pub mod telemetry;

use std::sync::Arc;

use domain::{
    CommandBus, CommandOutcome, FarmerId, ProduceCommand, ProduceCommandHandler, RetryPolicy,
    register_produce_handlers,
};
use event_store::{EventEnvelope, EventStore, InMemoryEventStore, PostgresEventStore};
use projections::{
    ChannelNotifier, FieldFilter, InMemoryReadModelStore, PostgresReadModelStore, PriceHistory,
    PriceHistoryProjection, ProduceCatalogProjection, ProduceDocument, ProjectionProcessor,
    ReadModelStore,
};
use tokio::sync::mpsc;

pub use config::{Config, LogFormat, StorageBackend};
pub use error::AppError;

/// The assembled write and read sides.
pub struct Application<S: EventStore + Clone + 'static> {
    store: S,
    bus: CommandBus<ProduceCommand>,
    processor: Arc<ProjectionProcessor<S>>,
    read_models: Arc<dyn ReadModelStore>,
    catalog: ProduceCatalogProjection,
    prices: PriceHistoryProjection,
}

impl<S: EventStore + Clone + 'static> Application<S> {
    /// Wires the bus, projections and ledger notifier over the given stores.
    ///
    /// Returns the application and the receiving end of the ledger channel.
    pub fn new(
        config: &Config,
        store: S,
        read_models: Arc<dyn ReadModelStore>,
    ) -> Result<(Self, mpsc::Receiver<EventEnvelope>), AppError> {
        let catalog = ProduceCatalogProjection::new(read_models.clone());
        let prices = PriceHistoryProjection::new(read_models.clone());

        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Arc::new(catalog.clone()));
        processor.register(Arc::new(prices.clone()));
        let processor = Arc::new(processor);

        let (notifier, ledger) = ChannelNotifier::channel(config.ledger_buffer);

        let handler = ProduceCommandHandler::new(store.clone())
            .with_retry_policy(RetryPolicy::new(config.command_max_attempts))
            .with_publisher(processor.clone())
            .with_publisher(Arc::new(notifier));

        let mut bus = CommandBus::new();
        register_produce_handlers(&mut bus, Arc::new(handler))?;

        tracing::info!(
            projections = processor.projection_count(),
            max_attempts = config.command_max_attempts,
            "application wired"
        );

        Ok((
            Self {
                store,
                bus,
                processor,
                read_models,
                catalog,
                prices,
            },
            ledger,
        ))
    }

    /// Sends a command through the bus.
    pub async fn send(&self, command: ProduceCommand) -> Result<CommandOutcome, AppError> {
        Ok(self.bus.send(command).await?)
    }

    /// Replays the event log into the read models.
    pub async fn catch_up(&self) -> Result<u64, AppError> {
        Ok(self.processor.run_catch_up().await?)
    }

    /// Wipes the read models and rebuilds them from the event log.
    pub async fn rebuild_read_models(&self) -> Result<u64, AppError> {
        Ok(self.processor.rebuild_all().await?)
    }

    /// Rebuilds a single read model by projection name.
    pub async fn rebuild_read_model(&self, name: &str) -> Result<u64, AppError> {
        Ok(self.processor.rebuild_projection(name).await?)
    }

    /// Fetches the catalog entry of one produce.
    pub async fn produce(&self, produce_id: &str) -> Result<ProduceDocument, AppError> {
        self.catalog
            .get(produce_id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                collection: ProduceCatalogProjection::COLLECTION,
                id: produce_id.to_string(),
            })
    }

    /// Lists the produce owned by a farmer.
    pub async fn produce_by_farmer(
        &self,
        farmer_id: &FarmerId,
    ) -> Result<Vec<ProduceDocument>, AppError> {
        Ok(self.catalog.by_farmer(farmer_id).await?)
    }

    /// Fetches the price history of one produce.
    pub async fn price_history(&self, produce_id: &str) -> Result<PriceHistory, AppError> {
        self.prices
            .history(produce_id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                collection: PriceHistoryProjection::COLLECTION,
                id: produce_id.to_string(),
            })
    }

    /// Runs an equality query against any read model collection.
    pub async fn find(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        Ok(self.read_models.find(collection, filter).await?)
    }

    /// Returns the event store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl Application<InMemoryEventStore> {
    /// Builds an application with nothing persisted outside the process.
    pub fn in_memory(
        config: &Config,
    ) -> Result<(Self, mpsc::Receiver<EventEnvelope>), AppError> {
        Self::new(
            config,
            InMemoryEventStore::new(),
            Arc::new(InMemoryReadModelStore::new()),
        )
    }
}

impl Application<PostgresEventStore> {
    /// Connects to `DATABASE_URL`, runs migrations and builds the application.
    pub async fn postgres(
        config: &Config,
    ) -> Result<(Self, mpsc::Receiver<EventEnvelope>), AppError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| AppError::Config("DATABASE_URL is required for postgres".to_string()))?;

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        let store = PostgresEventStore::new(pool.clone());
        store.run_migrations().await?;
        tracing::info!("database migrations applied");

        Self::new(config, store, Arc::new(PostgresReadModelStore::new(pool)))
    }
}
