use crate::services::notifications::NotificationService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Domain events emitted by the checkout and reconciliation flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    /// A confirmed order ready for the notification collaborator:
    /// emitted at creation for cash-on-delivery, at capture for gateway
    /// payments.
    OrderConfirmed(Uuid),
    PaymentInitiated {
        order_id: Uuid,
        remote_order_id: String,
    },
    PaymentCaptured {
        order_id: Uuid,
        remote_order_id: String,
    },
    PaymentFailed {
        remote_order_id: String,
    },
    DeliveryStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
}

/// Drains the event channel, logging every event and forwarding confirmed
/// orders to the notification collaborator. Notification failures are
/// logged and dropped; they never affect order or payment state.
pub async fn process_events(
    mut receiver: mpsc::Receiver<Event>,
    notifications: Arc<NotificationService>,
) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderConfirmed(order_id) => {
                if let Err(e) = notifications.send_order_confirmation(*order_id).await {
                    warn!(order_id = %order_id, error = %e, "Order confirmation delivery failed");
                }
            }
            Event::PaymentCaptured {
                order_id,
                remote_order_id,
            } => {
                info!(order_id = %order_id, remote_order_id = %remote_order_id, "Payment captured");
            }
            other => {
                info!(event = ?other, "Event processed");
            }
        }
    }

    info!("Event channel closed; processor exiting");
}
