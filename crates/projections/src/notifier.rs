//! Forwarding of committed events to an external ledger consumer.

use async_trait::async_trait;
use domain::EventPublisher;
use event_store::EventEnvelope;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Pushes committed events onto a bounded channel.
///
/// Delivery is fire-and-forget: when the consumer lags and the channel is
/// full, or the consumer is gone, the event is dropped with a warning rather
/// than stalling the command that produced it.
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<EventEnvelope>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiving end for the consumer.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }

    /// Wraps an existing sender.
    pub fn new(sender: mpsc::Sender<EventEnvelope>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventPublisher for ChannelNotifier {
    async fn publish(&self, events: &[EventEnvelope]) {
        for event in events {
            match self.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!(
                        event_id = %dropped.event_id,
                        event_type = %dropped.event_type,
                        "ledger channel full, dropping event"
                    );
                }
                Err(TrySendError::Closed(dropped)) => {
                    tracing::warn!(
                        event_id = %dropped.event_id,
                        event_type = %dropped.event_type,
                        "ledger consumer gone, dropping event"
                    );
                }
            }
        }
    }
}
