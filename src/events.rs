use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
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

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Invoice events
    InvoiceCreated(Uuid),
    InvoiceUpdated(Uuid),
    InvoiceDeleted(Uuid),

    // Catalog events
    PartCreated(Uuid),
    PartUpdated(Uuid),
    PartDeactivated(Uuid),
    /// A catalog entry was created implicitly while invoicing
    PartAutoCreated {
        part_id: Uuid,
        invoice_id: Uuid,
    },

    // Customer and vehicle events
    CustomerCreated(Uuid),
    CustomerUpdated(Uuid),
    CustomerDeleted(Uuid),
    VehicleCreated(Uuid),
    VehicleUpdated(Uuid),
    VehicleDeleted(Uuid),

    // User administration events
    UserCreated(Uuid),
    UserUpdated(Uuid),
    UserDeactivated(Uuid),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::InvoiceCreated(_) => "invoice.created",
            Event::InvoiceUpdated(_) => "invoice.updated",
            Event::InvoiceDeleted(_) => "invoice.deleted",
            Event::PartCreated(_) => "part.created",
            Event::PartUpdated(_) => "part.updated",
            Event::PartDeactivated(_) => "part.deactivated",
            Event::PartAutoCreated { .. } => "part.auto_created",
            Event::CustomerCreated(_) => "customer.created",
            Event::CustomerUpdated(_) => "customer.updated",
            Event::CustomerDeleted(_) => "customer.deleted",
            Event::VehicleCreated(_) => "vehicle.created",
            Event::VehicleUpdated(_) => "vehicle.updated",
            Event::VehicleDeleted(_) => "vehicle.deleted",
            Event::UserCreated(_) => "user.created",
            Event::UserUpdated(_) => "user.updated",
            Event::UserDeactivated(_) => "user.deactivated",
        }
    }
}

/// Background task draining the event channel. Today this only logs;
/// outbound integrations subscribe here.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        debug!(event = event.name(), payload = ?event, "Processing event");
    }
    info!("Event processor stopped: channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_sender_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let invoice_id = Uuid::new_v4();
        sender
            .send(Event::InvoiceCreated(invoice_id))
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::InvoiceCreated(id)) => assert_eq!(id, invoice_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::PartCreated(Uuid::new_v4())).await;
        assert!(result.is_err());
    }

    #[test]
    fn event_names_are_stable() {
        assert_eq!(Event::InvoiceCreated(Uuid::nil()).name(), "invoice.created");
        assert_eq!(
            Event::PartAutoCreated {
                part_id: Uuid::nil(),
                invoice_id: Uuid::nil()
            }
            .name(),
            "part.auto_created"
        );
    }
}
