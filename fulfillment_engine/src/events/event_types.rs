use std::fmt::Display;

use ofg_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{InventoryChange, Order, OrderStatusType, Product, WebhookSource};

/// The provider confirmed payment and the order moved to `processing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub transaction_id: Option<String>,
    pub amount: Option<Money>,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order, transaction_id: None, amount: None }
    }
}

/// The provider reported a failed payment. The order was cancelled and its stock put back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order: Order,
    pub restored: Vec<InventoryChange>,
    pub transaction_id: Option<String>,
    pub amount: Option<Money>,
    pub provider_status: String,
}

/// An operator moved an order along (or cancelled it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub previous: OrderStatusType,
    pub order: Order,
    pub changed_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEvent {
    pub product: Product,
    pub threshold: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    AuthenticationFailure,
    MalformedEvent,
    UnknownOrder,
    /// A verified notification that contradicts the order's settled payment, e.g. money captured on a cancelled order.
    LateContradiction,
    ProcessingError,
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationFailure => write!(f, "Signature verification failed"),
            Self::MalformedEvent => write!(f, "Malformed payment notification"),
            Self::UnknownOrder => write!(f, "Payment for unknown order"),
            Self::LateContradiction => write!(f, "Contradictory payment notification"),
            Self::ProcessingError => write!(f, "Payment notification processing error"),
        }
    }
}

/// Something about an inbound notification needs a human to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAnomalyEvent {
    pub kind: AnomalyKind,
    pub source: WebhookSource,
    pub payment_ref: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Option<Money>,
    pub remote_ip: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentEvent {
    OrderPaid(OrderPaidEvent),
    PaymentFailed(PaymentFailedEvent),
    StatusChanged(OrderStatusChangedEvent),
    LowStock(LowStockEvent),
    WebhookAnomaly(WebhookAnomalyEvent),
}
