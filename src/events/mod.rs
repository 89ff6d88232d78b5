use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Cheap, cloneable handle for publishing domain events.
///
/// Publishing never blocks and never fails a request: a full or closed
/// channel is reported back to the caller as an error string to log.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Queues an event without waiting for channel capacity.
    pub fn send(&self, event: Event) -> Result<(), String> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(ev) => {
                format!("Event channel full, dropped {}", ev.name())
            }
            mpsc::error::TrySendError::Closed(ev) => {
                format!("Event channel closed, dropped {}", ev.name())
            }
        })
    }

    /// Like [`send`](Self::send) but logs the failure instead of returning it.
    pub fn publish(&self, event: Event) {
        if let Err(e) = self.send(event) {
            counter!("shop_events_dropped_total", 1);
            warn!(error = %e, "Failed to publish event");
        }
    }
}

/// Things that happened in the shop that other parts of the system may care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ShopCreated(Uuid),
    ShopDeleted(Uuid),
    SupplierCreated(Uuid),
    ProductCreated(Uuid),
    ProductDeactivated(Uuid),
    CustomerCreated(Uuid),
    EmployeeCreated(Uuid),
    EmployeeDeactivated(Uuid),
    PromotionCreated(Uuid),
    InvoiceCreated {
        invoice_id: Uuid,
        shop_id: Uuid,
        total_amount: Decimal,
    },
    InvoiceCancelled(Uuid),
    PurchaseOrderCreated {
        purchase_order_id: Uuid,
        supplier_id: Uuid,
        total_amount: Decimal,
    },
    PurchaseOrderReceived(Uuid),
    PurchaseOrderCancelled(Uuid),
    StockAdjusted {
        product_id: Uuid,
        delta: i32,
        quantity_in_stock: i32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ShopCreated(_) => "shop_created",
            Event::ShopDeleted(_) => "shop_deleted",
            Event::SupplierCreated(_) => "supplier_created",
            Event::ProductCreated(_) => "product_created",
            Event::ProductDeactivated(_) => "product_deactivated",
            Event::CustomerCreated(_) => "customer_created",
            Event::EmployeeCreated(_) => "employee_created",
            Event::EmployeeDeactivated(_) => "employee_deactivated",
            Event::PromotionCreated(_) => "promotion_created",
            Event::InvoiceCreated { .. } => "invoice_created",
            Event::InvoiceCancelled(_) => "invoice_cancelled",
            Event::PurchaseOrderCreated { .. } => "purchase_order_created",
            Event::PurchaseOrderReceived(_) => "purchase_order_received",
            Event::PurchaseOrderCancelled(_) => "purchase_order_cancelled",
            Event::StockAdjusted { .. } => "stock_adjusted",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("shop_events_processed_total", 1, "event" => event.name());

        match &event {
            Event::InvoiceCreated {
                invoice_id,
                shop_id,
                total_amount,
            } => {
                info!(%invoice_id, %shop_id, %total_amount, "Invoice created");
            }
            Event::PurchaseOrderCreated {
                purchase_order_id,
                supplier_id,
                total_amount,
            } => {
                info!(%purchase_order_id, %supplier_id, %total_amount, "Purchase order created");
            }
            Event::StockAdjusted {
                product_id,
                delta,
                quantity_in_stock,
            } => {
                info!(%product_id, delta, quantity_in_stock, "Stock adjusted");
            }
            other => info!(event = other.name(), payload = ?other, "Domain event"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();
        sender.send(Event::CustomerCreated(id)).unwrap();
        assert_eq!(rx.recv().await, Some(Event::CustomerCreated(id)));
    }

    #[tokio::test]
    async fn full_channel_reports_instead_of_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        sender.send(Event::ShopCreated(Uuid::new_v4())).unwrap();
        let err = sender.send(Event::ShopCreated(Uuid::new_v4())).unwrap_err();
        assert!(err.contains("full"));
        sender.publish(Event::ShopCreated(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn closed_channel_reports_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let err = sender.send(Event::InvoiceCancelled(Uuid::new_v4())).unwrap_err();
        assert!(err.contains("closed"));
    }

    #[tokio::test]
    async fn processor_exits_when_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        sender.publish(Event::PurchaseOrderReceived(Uuid::new_v4()));
        drop(sender);
        process_events(rx).await;
    }
}
