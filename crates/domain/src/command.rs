//! Command handling infrastructure.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, CommandId};
use event_store::{EventEnvelope, Version};

use crate::error::DomainError;

/// Trait for commands routed through a [`CommandBus`].
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the target aggregate's current state doesn't allow the action.
pub trait Command: Debug + Send + Sync + 'static {
    /// Discriminator used to route the command to its handler.
    type Kind: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static;

    /// Returns the routing kind of this command.
    fn kind(&self) -> Self::Kind;

    /// Returns the unique id of this command instance.
    fn command_id(&self) -> CommandId;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Result of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The aggregate the command was applied to.
    pub aggregate_id: AggregateId,

    /// The aggregate version after the command.
    pub version: Version,

    /// The events that were persisted, empty for a no-op.
    pub events: Vec<EventEnvelope>,
}

/// Executes one kind of command.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Handles the command, returning what was committed.
    async fn handle(&self, command: C) -> Result<CommandOutcome, DomainError>;
}

/// How many times a handler runs a command that keeps hitting
/// concurrency conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` total attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Routes commands to the single handler registered for their kind.
///
/// Handlers are registered while wiring the application; afterwards the bus
/// is shared read-only.
pub struct CommandBus<C: Command> {
    handlers: HashMap<C::Kind, Arc<dyn CommandHandler<C>>>,
}

impl<C: Command> CommandBus<C> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Binds a handler to a command kind.
    ///
    /// Fails with `DuplicateHandler` if the kind already has one.
    pub fn register_handler(
        &mut self,
        kind: C::Kind,
        handler: Arc<dyn CommandHandler<C>>,
    ) -> Result<(), DomainError> {
        if self.handlers.contains_key(&kind) {
            return Err(DomainError::DuplicateHandler(kind.to_string()));
        }
        tracing::debug!(%kind, "command handler registered");
        self.handlers.insert(kind, handler);
        Ok(())
    }

    /// Returns whether a handler is bound to the kind.
    pub fn has_handler(&self, kind: C::Kind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Dispatches a command to its handler.
    #[tracing::instrument(
        skip(self, command),
        fields(kind = %command.kind(), command_id = %command.command_id())
    )]
    pub async fn send(&self, command: C) -> Result<CommandOutcome, DomainError> {
        let kind = command.kind();
        let handler = self
            .handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| DomainError::NoHandlerRegistered(kind.to_string()))?;

        let result = handler.handle(command).await;
        match &result {
            Ok(outcome) => {
                metrics::counter!("commands_handled", "kind" => kind.to_string(), "outcome" => "ok")
                    .increment(1);
                tracing::info!(
                    aggregate_id = %outcome.aggregate_id,
                    version = %outcome.version,
                    events = outcome.events.len(),
                    "command handled"
                );
            }
            Err(err) => {
                metrics::counter!(
                    "commands_handled",
                    "kind" => kind.to_string(),
                    "outcome" => err.kind().as_str()
                )
                .increment(1);
                tracing::warn!(error = %err, "command rejected");
            }
        }
        result
    }
}

impl<C: Command> Default for CommandBus<C> {
    fn default() -> Self {
        Self::new()
    }
}
