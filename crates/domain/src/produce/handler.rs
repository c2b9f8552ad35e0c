//! Command handler for the produce aggregate.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::{Command, CommandBus, CommandHandler, CommandOutcome, RetryPolicy};
use crate::error::DomainError;
use crate::publisher::EventPublisher;
use crate::repository::Repository;

use super::{CommandKind, ProduceAggregate, ProduceCommand, ProduceError};

/// Handles every produce command kind.
///
/// Each attempt loads fresh state, applies the operation, and appends with
/// the loaded version as the expected version. Concurrency conflicts are
/// retried up to the configured policy; everything else is returned as is.
/// Committed events are handed to the configured publishers once.
pub struct ProduceCommandHandler<S: EventStore> {
    repository: Repository<S, ProduceAggregate>,
    publishers: Vec<Arc<dyn EventPublisher>>,
    retry: RetryPolicy,
}

impl<S: EventStore> ProduceCommandHandler<S> {
    /// Creates a handler with the default retry policy and no publishers.
    pub fn new(store: S) -> Self {
        Self {
            repository: Repository::new(store),
            publishers: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the retry policy for concurrency conflicts.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Adds a publisher that receives committed events.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    /// Returns the repository used to load and save produce.
    pub fn repository(&self) -> &Repository<S, ProduceAggregate> {
        &self.repository
    }

    /// Runs a command, retrying on concurrency conflicts.
    #[tracing::instrument(
        skip(self, command),
        fields(kind = %command.kind(), aggregate_id = %command.aggregate_id())
    )]
    pub async fn execute(&self, command: &ProduceCommand) -> Result<CommandOutcome, DomainError> {
        let mut attempt = 1;
        let outcome = loop {
            match self.attempt(command).await {
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    metrics::counter!("command_conflicts_retried").increment(1);
                    tracing::warn!(attempt, error = %err, "concurrency conflict, retrying");
                    attempt += 1;
                }
                result => break result?,
            }
        };

        if !outcome.events.is_empty() {
            for publisher in &self.publishers {
                publisher.publish(&outcome.events).await;
            }
        }

        Ok(outcome)
    }

    async fn attempt(&self, command: &ProduceCommand) -> Result<CommandOutcome, DomainError> {
        let aggregate_id = command.aggregate_id();
        let existing = self.repository.load(aggregate_id).await?;

        let mut produce = match (command, existing) {
            (ProduceCommand::RegisterProduce(_), Some(_)) => {
                return Err(ProduceError::AlreadyRegistered(aggregate_id).into());
            }
            (ProduceCommand::RegisterProduce(cmd), None) => ProduceAggregate::register_with_id(
                cmd.produce_id,
                cmd.farmer_id.clone(),
                cmd.origin.clone(),
                cmd.quality.clone(),
                cmd.initial_price,
            )?,
            (_, None) => {
                return Err(DomainError::NotFound {
                    aggregate_type: ProduceAggregate::aggregate_type(),
                    aggregate_id: aggregate_id.to_string(),
                });
            }
            (command, Some(mut produce)) => {
                Self::apply(&mut produce, command)?;
                produce
            }
        };

        let events = self.repository.save(&mut produce).await?;
        tracing::debug!(
            version = %produce.version(),
            events = events.len(),
            "produce saved"
        );

        Ok(CommandOutcome {
            aggregate_id,
            version: produce.version(),
            events,
        })
    }

    fn apply(produce: &mut ProduceAggregate, command: &ProduceCommand) -> Result<(), ProduceError> {
        match command {
            ProduceCommand::RegisterProduce(_) => Err(ProduceError::AlreadyRegistered(produce.id())),
            ProduceCommand::UpdateQuality(cmd) => {
                produce.update_quality(cmd.new_quality.clone(), &cmd.updater_id)
            }
            ProduceCommand::UpdatePrice(cmd) => produce.update_price(cmd.new_price, &cmd.updater_id),
            ProduceCommand::DeactivateProduce(_) => produce.deactivate(),
        }
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandHandler<ProduceCommand> for ProduceCommandHandler<S> {
    async fn handle(&self, command: ProduceCommand) -> Result<CommandOutcome, DomainError> {
        self.execute(&command).await
    }
}

/// Binds one handler to every produce command kind.
pub fn register_produce_handlers<S: EventStore + 'static>(
    bus: &mut CommandBus<ProduceCommand>,
    handler: Arc<ProduceCommandHandler<S>>,
) -> Result<(), DomainError> {
    for kind in CommandKind::ALL {
        bus.register_handler(kind, handler.clone())?;
    }
    Ok(())
}
