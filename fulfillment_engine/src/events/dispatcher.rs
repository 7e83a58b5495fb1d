//! Notification fan-out.
//!
//! The dispatcher is an ordinary event hook. For every [`FulfillmentEvent`] it writes in-app notifications (for the
//! customer, the operators group, or both) and sends the matching email or alert through a [`MessageSender`].
//!
//! Nothing here can affect an order. Delivery is best effort: each outbound send is bounded by a timeout and by a cap
//! on concurrent sends. A message that cannot go out straight away is logged and dropped.
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::{
    db::traits::NotificationManagement,
    db_types::{NewNotification, NotificationType, OrderStatusType, Recipient},
    events::{FulfillmentEvent, Handler},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Message was rejected: {0}")]
    Rejected(String),
}

/// The email / alert delivery service.
pub trait MessageSender {
    fn send(&self, message: OutboundMessage) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// A sender that only writes messages to the log. Used when no delivery service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessageSender;

impl MessageSender for LogMessageSender {
    async fn send(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        info!("📬️ [{}] {}: {}", message.to, message.subject, message.body);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    pub timeout: Duration,
    pub max_in_flight: usize,
    /// Where operator alerts are emailed. Alerts are in-app only if this is `None`.
    pub operator_email: Option<String>,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(5), max_in_flight: 16, operator_email: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNotification {
    pub notification: NewNotification,
    /// Also email the notification to this address
    pub email_to: Option<String>,
}

impl PlannedNotification {
    fn new(notification: NewNotification, email_to: Option<String>) -> Self {
        Self { notification, email_to }
    }
}

fn amount_text(amount: Option<ofg_common::Money>) -> String {
    amount.map(|a| a.to_string()).unwrap_or_else(|| "an unknown amount".to_string())
}

/// Decides who hears about an event, and what they are told.
pub fn plan_notifications(event: &FulfillmentEvent, operator_email: Option<&str>) -> Vec<PlannedNotification> {
    let operator_email = operator_email.map(String::from);
    match event {
        FulfillmentEvent::OrderPaid(ev) => {
            let order = &ev.order;
            let notification = NewNotification::new(
                Recipient::Customer(order.customer_id.clone()),
                NotificationType::OrderUpdate,
                format!("Order {} confirmed", order.id),
                format!(
                    "We received your payment of {} for order {}. It is now being prepared.",
                    order.total, order.id
                ),
            );
            vec![PlannedNotification::new(notification, order.customer_email.clone())]
        },
        FulfillmentEvent::PaymentFailed(ev) => {
            let order = &ev.order;
            let customer = NewNotification::new(
                Recipient::Customer(order.customer_id.clone()),
                NotificationType::PaymentFailed,
                format!("Payment failed for order {}", order.id),
                format!("Your payment for order {} did not go through, so the order has been cancelled.", order.id),
            );
            let operators = NewNotification::new(
                Recipient::Operators,
                NotificationType::PaymentFailed,
                format!("Payment failed: {}", order.payment_ref),
                format!(
                    "Order {} ({}) was cancelled after the provider reported '{}'. Amount: {}. Transaction: {}. {} \
                     item lines were returned to stock.",
                    order.id,
                    order.payment_ref,
                    ev.provider_status,
                    amount_text(ev.amount),
                    ev.transaction_id.as_deref().unwrap_or("n/a"),
                    ev.restored.len()
                ),
            );
            vec![
                PlannedNotification::new(customer, order.customer_email.clone()),
                PlannedNotification::new(operators, operator_email),
            ]
        },
        FulfillmentEvent::StatusChanged(ev) => {
            let order = &ev.order;
            let recipient = Recipient::Customer(order.customer_id.clone());
            let (title, message, email) = match order.status {
                OrderStatusType::Shipped => {
                    let tracking = match (&order.tracking_number, &order.carrier) {
                        (Some(t), Some(c)) => format!(" Tracking number: {t} ({c})."),
                        (Some(t), None) => format!(" Tracking number: {t}."),
                        _ => String::new(),
                    };
                    (format!("Order {} has shipped", order.id), format!("Your order is on its way.{tracking}"), true)
                },
                OrderStatusType::Delivered => {
                    (format!("Order {} was delivered", order.id), "Your order has been delivered.".to_string(), true)
                },
                OrderStatusType::Cancelled => {
                    (format!("Order {} was cancelled", order.id), "Your order has been cancelled.".to_string(), true)
                },
                status => (format!("Order {} update", order.id), format!("Your order is now {status}."), false),
            };
            let notification = NewNotification::new(recipient, NotificationType::OrderUpdate, title, message);
            let email_to = if email { order.customer_email.clone() } else { None };
            vec![PlannedNotification::new(notification, email_to)]
        },
        FulfillmentEvent::LowStock(ev) => {
            let notification = NewNotification::new(
                Recipient::Operators,
                NotificationType::LowStock,
                format!("Low stock: {}", ev.product.name),
                format!(
                    "Product {} ({}) is down to {} units. The alert threshold is {}.",
                    ev.product.id, ev.product.name, ev.product.stock, ev.threshold
                ),
            );
            vec![PlannedNotification::new(notification, operator_email)]
        },
        FulfillmentEvent::WebhookAnomaly(ev) => {
            let notification = NewNotification::new(
                Recipient::Operators,
                NotificationType::WebhookAnomaly,
                format!("{}: {}", ev.kind, ev.payment_ref.as_deref().unwrap_or("no reference")),
                format!(
                    "{} via {}. Amount: {}. Transaction: {}. Remote address: {}. {}",
                    ev.kind,
                    ev.source,
                    amount_text(ev.amount),
                    ev.transaction_id.as_deref().unwrap_or("n/a"),
                    ev.remote_ip.as_deref().unwrap_or("unknown"),
                    ev.detail
                ),
            );
            vec![PlannedNotification::new(notification, operator_email)]
        },
    }
}

pub struct NotificationDispatcher<B, S> {
    db: B,
    sender: S,
    policy: DeliveryPolicy,
    permits: Arc<Semaphore>,
}

impl<B, S> NotificationDispatcher<B, S>
where
    B: NotificationManagement + Send + Sync + 'static,
    S: MessageSender + Send + Sync + 'static,
{
    pub fn new(db: B, sender: S, policy: DeliveryPolicy) -> Self {
        let permits = Arc::new(Semaphore::new(policy.max_in_flight.max(1)));
        Self { db, sender, policy, permits }
    }

    pub async fn dispatch(&self, event: FulfillmentEvent) {
        for planned in plan_notifications(&event, self.policy.operator_email.as_deref()) {
            let PlannedNotification { notification, email_to } = planned;
            let subject = notification.title.clone();
            let body = notification.message.clone();
            let recipient = notification.recipient.clone();
            match self.db.insert_notification(notification).await {
                Ok(n) => trace!("📬️ Notification #{} stored for {recipient}", n.id),
                Err(e) => warn!("📬️ Could not store notification '{subject}' for {recipient}: {e}"),
            }
            if let Some(to) = email_to {
                self.deliver(OutboundMessage { to, subject, body }).await;
            }
        }
    }

    async fn deliver(&self, message: OutboundMessage) {
        let Ok(_permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            warn!("📬️ Too many deliveries in flight. Message '{}' to {} dropped.", message.subject, message.to);
            return;
        };
        let to = message.to.clone();
        let subject = message.subject.clone();
        match tokio::time::timeout(self.policy.timeout, self.sender.send(message)).await {
            Ok(Ok(())) => debug!("📬️ Message '{subject}' sent to {to}"),
            Ok(Err(e)) => warn!("📬️ Message '{subject}' to {to} dropped: {e}"),
            Err(_) => warn!("📬️ Message '{subject}' to {to} dropped: timed out after {:?}", self.policy.timeout),
        }
    }

    /// Wraps the dispatcher as an event hook.
    pub fn into_hook(self) -> Handler<FulfillmentEvent> {
        let dispatcher = Arc::new(self);
        Arc::new(move |event: FulfillmentEvent| {
            let dispatcher = Arc::clone(&dispatcher);
            Box::pin(async move { dispatcher.dispatch(event).await }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
    }
}
