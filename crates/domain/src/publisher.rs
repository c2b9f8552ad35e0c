//! Outbound hook for committed events.

use async_trait::async_trait;
use event_store::EventEnvelope;

/// Receives events after they have been durably appended.
///
/// Publishing happens after the write has committed, so an implementation
/// cannot fail the command that produced the events. Implementations handle
/// and log their own failures.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one committed batch, in version order.
    async fn publish(&self, events: &[EventEnvelope]);
}
