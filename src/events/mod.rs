use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain events emitted by the fulfillment engine after a transaction
/// commits. Event delivery is best-effort: a full or closed channel is
/// logged, never surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BatchReceived {
        batch_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    ItemDamaged {
        item_id: Uuid,
        batch_id: Uuid,
    },
    OrderCreated(Uuid),
    OrderProcessed {
        order_id: Uuid,
        package_id: Uuid,
    },
    TransportAssigned {
        package_id: Uuid,
        transport_id: Uuid,
        transporter_id: Uuid,
    },
    PackageDispatched(Uuid),
    PackageDelivered {
        package_id: Uuid,
        delivered_at: DateTime<Utc>,
    },
    ReturnInitiated {
        return_id: Uuid,
        package_id: Uuid,
    },
    ReturnPickupScheduled {
        return_id: Uuid,
        transport_id: Uuid,
    },
    ReturnPickedUp(Uuid),
    ReturnProcessed {
        return_id: Uuid,
        restocked: i32,
    },
    SaleConfirmed {
        package_id: Uuid,
        sales_record_id: Uuid,
        confirmed_by: String,
    },
}

impl Event {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::BatchReceived { .. } => "batch_received",
            Event::ItemDamaged { .. } => "item_damaged",
            Event::OrderCreated(_) => "order_created",
            Event::OrderProcessed { .. } => "order_processed",
            Event::TransportAssigned { .. } => "transport_assigned",
            Event::PackageDispatched(_) => "package_dispatched",
            Event::PackageDelivered { .. } => "package_delivered",
            Event::ReturnInitiated { .. } => "return_initiated",
            Event::ReturnPickupScheduled { .. } => "return_pickup_scheduled",
            Event::ReturnPickedUp(_) => "return_picked_up",
            Event::ReturnProcessed { .. } => "return_processed",
            Event::SaleConfirmed { .. } => "sale_confirmed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Consumes events off the channel. The analytics and notification
/// collaborators subscribe downstream of this loop; here events are logged.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        debug!(event = event.name(), payload = ?event, "Domain event");
        match &event {
            Event::SaleConfirmed {
                package_id,
                sales_record_id,
                confirmed_by,
            } => {
                info!(
                    package_id = %package_id,
                    sales_record_id = %sales_record_id,
                    confirmed_by = %confirmed_by,
                    "Sale confirmed"
                );
            }
            Event::ReturnProcessed {
                return_id,
                restocked,
            } => {
                info!(return_id = %return_id, restocked = restocked, "Return processed");
            }
            _ => {}
        }
    }
    warn!("Event channel closed; processor exiting");
}
