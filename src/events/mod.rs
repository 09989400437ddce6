use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::ServiceError;

/// Domain events emitted by the service layer after a state change has been
/// committed. Consumers must tolerate duplicates; emission is best-effort and
/// happens outside the database transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ProductCreated(i64),
    ProductUpdated(i64),
    ProductDeactivated(i64),

    ReceiptCreated(i64),
    ReceiptStatusChanged {
        receipt_id: i64,
        old_status: String,
        new_status: String,
    },
    /// A receipt reached `validated` and its quantities were posted to stock.
    ReceiptValidated(i64),

    DeliveryCreated(i64),
    DeliveryStatusChanged {
        delivery_id: i64,
        old_status: String,
        new_status: String,
    },

    TransferCreated(i64),

    UserSynced { clerk_user_id: String },
    UserRemoved { clerk_user_id: String },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting if the channel is at capacity.
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("failed to send event: {}", e)))
    }

    /// Best-effort send for use after a transaction has committed, where a
    /// full channel must not fail the request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            tracing::warn!("event dropped: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Runs until every sender has
/// been dropped, which happens during shutdown.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::ReceiptValidated(id) => {
                info!(receipt_id = id, "receipt validated and posted to inventory")
            }
            Event::ReceiptStatusChanged {
                receipt_id,
                old_status,
                new_status,
            } => info!(receipt_id, %old_status, %new_status, "receipt status changed"),
            Event::DeliveryStatusChanged {
                delivery_id,
                old_status,
                new_status,
            } => info!(delivery_id, %old_status, %new_status, "delivery status changed"),
            Event::UserSynced { clerk_user_id } => {
                info!(%clerk_user_id, "user synced from identity provider")
            }
            Event::UserRemoved { clerk_user_id } => {
                info!(%clerk_user_id, "user removed after identity provider deletion")
            }
            other => debug!(event = ?other, "event processed"),
        }
    }
    info!("event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        sender.send(Event::ReceiptCreated(42)).await.unwrap();
        match rx.recv().await {
            Some(Event::ReceiptCreated(id)) => assert_eq!(id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let err = sender.send(Event::TransferCreated(1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::EventError(_)));
    }
}
