use std::fmt::Display;

use fulfillment_engine::{
    db_types::{ChangeType, NewOrder, NewOrderItem, OrderStatusType, StatusChange},
    DeliveryOutcome,
};
use ofg_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// What the provider gets back for a delivery. The provider only looks at the status code; the body is for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub received: bool,
    pub outcome: String,
    pub message: String,
}

impl From<&DeliveryOutcome> for DeliveryResponse {
    fn from(outcome: &DeliveryOutcome) -> Self {
        let received = !matches!(outcome, DeliveryOutcome::Malformed(_) | DeliveryOutcome::SignatureInvalid);
        Self { received, outcome: outcome.code().to_string(), message: outcome.to_string() }
    }
}

//------------------------------------------------   Orders   ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
    /// A decimal string, e.g. "750.00"
    pub unit_price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub customer_id: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub payment_ref: String,
    pub items: Vec<OrderItemRequest>,
}

impl NewOrderRequest {
    pub fn into_new_order(self) -> Result<NewOrder, String> {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                let price = item
                    .unit_price
                    .parse::<Money>()
                    .map_err(|e| format!("Invalid unit price for product {}: {e}", item.product_id))?;
                Ok(NewOrderItem::new(item.product_id, item.quantity, price))
            })
            .collect::<Result<Vec<_>, String>>()?;
        let mut order = NewOrder::new(self.customer_id, self.payment_ref, items);
        if let Some(email) = self.customer_email.filter(|e| !e.trim().is_empty()) {
            order = order.with_email(email);
        }
        Ok(order)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl StatusUpdateRequest {
    pub fn has_tracking_number(&self) -> bool {
        self.tracking_number.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn into_change(self, changed_by: &str) -> (OrderStatusType, StatusChange) {
        let change = StatusChange {
            changed_by: Some(changed_by.to_string()),
            note: self.note,
            tracking_number: self.tracking_number.filter(|t| !t.trim().is_empty()),
            carrier: self.carrier.filter(|c| !c.trim().is_empty()),
        };
        (self.status, change)
    }
}

//-----------------------------------------------   Inventory   -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustmentRequest {
    pub delta: i64,
    /// `manual` (the default) or `bulk`. The other change types belong to the order flow.
    #[serde(default)]
    pub change_type: Option<ChangeType>,
    #[serde(default)]
    pub note: Option<String>,
}

impl StockAdjustmentRequest {
    pub fn change_type(&self) -> Result<ChangeType, String> {
        match self.change_type.unwrap_or(ChangeType::Manual) {
            t @ (ChangeType::Manual | ChangeType::Bulk) => Ok(t),
            t => Err(format!("'{t}' adjustments are made by the order flow, not by operators")),
        }
    }
}

//---------------------------------------------   Notifications   -----------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}
