use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::stock_transaction::TransactionStatus;
use crate::errors::ServiceError;

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
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends an event after a committed write; delivery failures are only logged.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

/// Domain events emitted once the corresponding write has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PartCreated {
        part_id: Uuid,
        part_number: String,
    },
    PartUpdated(Uuid),
    PartLinkedToAsset {
        part_id: Uuid,
        asset_id: Uuid,
    },
    PartQuantityChanged {
        part_id: Uuid,
        old_quantity: Decimal,
        new_quantity: Decimal,
        transaction_id: Uuid,
    },
    StockTransactionCreated {
        transaction_id: Uuid,
        transaction_number: String,
    },
    StockTransactionStatusChanged {
        transaction_id: Uuid,
        old_status: TransactionStatus,
        new_status: TransactionStatus,
    },
    StockTransactionDeleted(Uuid),
    PartsSyncCompleted {
        assets_processed: u64,
        parts_created: u64,
        parts_linked: u64,
        failures: u64,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::PartCreated { .. } => "part_created",
            Event::PartUpdated(_) => "part_updated",
            Event::PartLinkedToAsset { .. } => "part_linked_to_asset",
            Event::PartQuantityChanged { .. } => "part_quantity_changed",
            Event::StockTransactionCreated { .. } => "stock_transaction_created",
            Event::StockTransactionStatusChanged { .. } => "stock_transaction_status_changed",
            Event::StockTransactionDeleted(_) => "stock_transaction_deleted",
            Event::PartsSyncCompleted { .. } => "parts_sync_completed",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("cmms.events.processed", 1, "event" => event.name());

        match &event {
            Event::PartQuantityChanged {
                part_id,
                old_quantity,
                new_quantity,
                transaction_id,
            } => {
                info!(
                    %part_id,
                    %transaction_id,
                    old_quantity = %old_quantity,
                    new_quantity = %new_quantity,
                    "part quantity changed"
                );
            }
            Event::StockTransactionStatusChanged {
                transaction_id,
                old_status,
                new_status,
            } => {
                info!(
                    %transaction_id,
                    from = %old_status,
                    to = %new_status,
                    "stock transaction status changed"
                );
            }
            Event::PartsSyncCompleted { failures, .. } if *failures > 0 => {
                warn!(?event, "parts sync completed with failures");
            }
            other => info!(event = other.name(), payload = ?other, "event received"),
        }
    }

    info!("Event processing loop stopped");
}
