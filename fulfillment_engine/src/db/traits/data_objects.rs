use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{InventoryChange, Order, WebhookSource};

/// The result of applying a payment notification to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTransition {
    /// The guarded update matched and the order moved. For failures, `restored` holds one `restore` entry per item.
    Applied { order: Order, restored: Vec<InventoryChange> },
    /// The order already carries the payment status this notification claims. Another delivery got there first.
    AlreadyApplied(Order),
    /// The order has moved somewhere this notification cannot take it, e.g. a success arriving for a failed or
    /// cancelled order. Nothing was changed.
    Conflict(Order),
    /// No order carries the given payment reference.
    OrderNotFound,
}

/// Criteria for searching the webhook ledger. Results are returned newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEventQueryFilter {
    pub payment_ref: Option<String>,
    pub source: Option<WebhookSource>,
    pub signature_valid: Option<bool>,
    pub processed: Option<bool>,
    pub duplicate: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl WebhookEventQueryFilter {
    pub fn with_payment_ref<S: Into<String>>(mut self, payment_ref: S) -> Self {
        self.payment_ref = Some(payment_ref.into());
        self
    }

    pub fn with_source(mut self, source: WebhookSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_signature_valid(mut self, valid: bool) -> Self {
        self.signature_valid = Some(valid);
        self
    }

    pub fn with_processed(mut self, processed: bool) -> Self {
        self.processed = Some(processed);
        self
    }

    pub fn with_duplicate(mut self, duplicate: bool) -> Self {
        self.duplicate = Some(duplicate);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payment_ref.is_none() &&
            self.source.is_none() &&
            self.signature_valid.is_none() &&
            self.processed.is_none() &&
            self.duplicate.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}
