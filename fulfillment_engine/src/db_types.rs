use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use ofg_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been placed. Payment has not been confirmed yet.
    Pending,
    /// Payment has been received and the order is being prepared.
    Processing,
    /// The order has left the warehouse.
    Shipped,
    /// The order has reached the customer. Terminal.
    Delivered,
    /// The order was cancelled by an operator or by a failed payment. Terminal.
    Cancelled,
}

impl OrderStatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    /// Set by the returns flow, which lives outside this crate.
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub customer_email: Option<String>,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub total: Money,
    pub payment_ref: String,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item snapshot, captured when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub position: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64, unit_price: Money) -> Self {
        Self { product_id, quantity, unit_price }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: String,
    pub customer_email: Option<String>,
    /// The reference the payment provider will quote in every notification about this order.
    pub payment_ref: String,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer_id: S, payment_ref: S, items: Vec<NewOrderItem>) -> Self {
        Self { customer_id: customer_id.into(), customer_email: None, payment_ref: payment_ref.into(), items }
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    /// The sum of every line. `None` if it overflows.
    pub fn total(&self) -> Option<Money> {
        self.items
            .iter()
            .try_fold(Money::default(), |sum, item| sum.checked_add(item.unit_price.checked_mul(item.quantity)?))
    }
}

//-------------------------------------- OrderStatusHistory ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    /// `None` when the system (i.e. a payment notification) made the change.
    pub changed_by: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Describes an administrative status change. Shipping details are ignored unless the target status is `Shipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub changed_by: Option<String>,
    pub note: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

impl StatusChange {
    pub fn by<S: Into<String>>(actor: S) -> Self {
        Self { changed_by: Some(actor.into()), ..Default::default() }
    }

    pub fn with_tracking<S: Into<String>>(mut self, tracking_number: S, carrier: Option<S>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self.carrier = carrier.map(Into::into);
        self
    }
}

//--------------------------------------       Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub stock: i64,
    pub low_stock_threshold: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: Option<i64>,
    pub name: String,
    pub stock: i64,
    pub low_stock_threshold: Option<i64>,
}

//--------------------------------------   InventoryChange    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Stock taken by a placed order
    Order,
    Manual,
    Bulk,
    /// Stock returned after a payment failure
    Restore,
}

impl Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order => write!(f, "order"),
            Self::Manual => write!(f, "manual"),
            Self::Bulk => write!(f, "bulk"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

impl FromStr for ChangeType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "order" => Ok(Self::Order),
            "manual" => Ok(Self::Manual),
            "bulk" => Ok(Self::Bulk),
            "restore" => Ok(Self::Restore),
            _ => Err(ConversionError(format!("Invalid inventory change type: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryChange {
    pub id: i64,
    pub product_id: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    /// The delta that was actually applied, i.e. `new_stock - previous_stock`.
    pub change_amount: i64,
    pub change_type: ChangeType,
    pub changed_by: Option<String>,
    pub note: Option<String>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: i64,
    pub delta: i64,
    pub change_type: ChangeType,
    pub changed_by: Option<String>,
    pub note: Option<String>,
    pub order_id: Option<OrderId>,
}

impl StockAdjustment {
    pub fn new(product_id: i64, delta: i64, change_type: ChangeType) -> Self {
        Self { product_id, delta, change_type, changed_by: None, note: None, order_id: None }
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.changed_by = actor;
        self
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

//--------------------------------------    WebhookEvent      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WebhookSource {
    /// JSON body POSTed by the provider
    Webhook,
    /// Query-string redirect
    Callback,
}

impl Display for WebhookSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webhook => write!(f, "webhook"),
            Self::Callback => write!(f, "callback"),
        }
    }
}

impl FromStr for WebhookSource {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webhook" => Ok(Self::Webhook),
            "callback" => Ok(Self::Callback),
            _ => Err(ConversionError(format!("Invalid webhook source: {s}"))),
        }
    }
}

/// The provider's status, reduced to the logical event it describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimedStatus {
    Paid,
    Failed,
    /// Any status that does not describe a settlement, e.g. "pending" or "authorized".
    Other(String),
}

impl ClaimedStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for ClaimedStatus {
    fn from(raw: &str) -> Self {
        let status = raw.trim().to_ascii_lowercase();
        match status.as_str() {
            "success" | "completed" | "paid" => Self::Paid,
            "failed" | "cancelled" | "canceled" | "expired" => Self::Failed,
            _ => Self::Other(status),
        }
    }
}

impl Display for ClaimedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the append-only webhook ledger. Every delivery gets one, whatever happened to it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub source: WebhookSource,
    pub event_type: Option<String>,
    pub payment_ref: Option<String>,
    pub transaction_id: Option<String>,
    pub claimed_status: Option<String>,
    pub claimed_amount: Option<Money>,
    pub signature_valid: bool,
    pub processed: bool,
    pub duplicate: bool,
    pub outcome: String,
    pub remote_ip: Option<String>,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWebhookEvent {
    pub source: WebhookSource,
    pub event_type: Option<String>,
    pub payment_ref: Option<String>,
    pub transaction_id: Option<String>,
    pub claimed_status: Option<String>,
    pub claimed_amount: Option<Money>,
    pub signature_valid: bool,
    pub processed: bool,
    pub duplicate: bool,
    pub outcome: String,
    pub remote_ip: Option<String>,
    pub payload: String,
}

//--------------------------------------    Notification      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    Customer,
    Operators,
}

/// Who an in-app notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    Customer(String),
    Operators,
}

impl Recipient {
    pub fn kind(&self) -> RecipientKind {
        match self {
            Self::Customer(_) => RecipientKind::Customer,
            Self::Operators => RecipientKind::Operators,
        }
    }

    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Self::Customer(id) => Some(id.as_str()),
            Self::Operators => None,
        }
    }
}

impl Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer(id) => write!(f, "customer {id}"),
            Self::Operators => write!(f, "operators"),
        }
    }
}

/// `operators` addresses the operator group. Anything else is taken to be a customer id.
impl FromStr for Recipient {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ConversionError("Recipient cannot be empty".into())),
            "operators" => Ok(Self::Operators),
            id => Ok(Self::Customer(id.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderUpdate,
    PaymentFailed,
    LowStock,
    WebhookAnomaly,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_kind: RecipientKind,
    pub recipient_id: Option<String>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn recipient(&self) -> Recipient {
        match (self.recipient_kind, &self.recipient_id) {
            (RecipientKind::Customer, Some(id)) => Recipient::Customer(id.clone()),
            // A customer row without an id cannot be written, see the CHECK constraint on the table
            _ => Recipient::Operators,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient: Recipient,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
}

impl NewNotification {
    pub fn new<S: Into<String>>(
        recipient: Recipient,
        notification_type: NotificationType,
        title: S,
        message: S,
    ) -> Self {
        Self { recipient, notification_type, title: title.into(), message: message.into() }
    }
}
