//! Core projection trait.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// A projection that turns committed events into read model documents.
///
/// Handling must be idempotent: delivering the same event twice leaves the
/// read model as if it had been delivered once. Replays and retries rely on
/// this.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Event types this projection wants to receive.
    fn subscribed_to(&self) -> &'static [&'static str];

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Drops everything the projection has written.
    async fn reset(&self) -> Result<()>;

    /// Returns true if the event type is in [`Projection::subscribed_to`].
    fn is_subscribed(&self, event_type: &str) -> bool {
        self.subscribed_to().contains(&event_type)
    }
}
