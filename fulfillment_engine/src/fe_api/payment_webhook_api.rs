use std::fmt::{Debug, Display};

use log::*;

use crate::{
    db::traits::{FulfillmentDatabase, OrderManagement, PaymentTransition, WebhookLedger},
    db_types::{ClaimedStatus, NewWebhookEvent, OrderId, OrderStatusType, PaymentStatus, WebhookSource},
    events::{AnomalyKind, EventProducers, FulfillmentEvent, WebhookAnomalyEvent},
    fe_api::{OrderFlowApi, WebhookLedgerApi},
    helpers::{MalformedEvent, PaymentNotification, SignatureVerifier},
};

/// One inbound delivery, on either channel, as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct InboundDelivery {
    pub source: WebhookSource,
    pub remote_ip: Option<String>,
    /// The body or query string exactly as received
    pub raw_payload: String,
    pub notification: Result<PaymentNotification, MalformedEvent>,
}

/// What happened to a delivery. Each variant maps to the ledger's `outcome` column via [`DeliveryOutcome::code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Identifying fields were missing or unreadable
    Malformed(MalformedEvent),
    SignatureInvalid,
    /// A verified notification whose status settles nothing, e.g. "pending"
    Ignored,
    /// This logical event was already applied, either before this delivery arrived or by a delivery racing it
    Duplicate,
    Applied { order_id: OrderId, status: ClaimedStatus },
    /// The order has already settled the other way, or has moved past the point where this event can apply
    Conflict { order_id: OrderId, payment_status: PaymentStatus, status: OrderStatusType },
    UnknownOrder,
    /// Something broke after the signature was verified. The order was not changed.
    ProcessingError(String),
}

impl DeliveryOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::SignatureInvalid => "signature_invalid",
            Self::Ignored => "ignored_status",
            Self::Duplicate => "duplicate",
            Self::Applied { .. } => "applied",
            Self::Conflict { .. } => "late_contradiction",
            Self::UnknownOrder => "unknown_order",
            Self::ProcessingError(_) => "processing_error",
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

impl Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "{e}"),
            Self::Applied { order_id, status } => write!(f, "order {order_id} marked {status}"),
            Self::Conflict { order_id, payment_status, status } => {
                write!(f, "order {order_id} is already {status} with payment {payment_status}")
            },
            Self::ProcessingError(e) => write!(f, "processing error: {e}"),
            other => f.write_str(other.code()),
        }
    }
}

fn ledger_entry(
    source: WebhookSource,
    remote_ip: Option<String>,
    payload: String,
    notification: &PaymentNotification,
) -> NewWebhookEvent {
    NewWebhookEvent {
        source,
        event_type: notification.event_type.clone(),
        payment_ref: Some(notification.payment_ref.clone()),
        transaction_id: notification.transaction_id.clone(),
        claimed_status: Some(notification.claimed_status.to_string()),
        claimed_amount: notification.amount,
        signature_valid: false,
        processed: false,
        duplicate: false,
        outcome: String::new(),
        remote_ip,
        payload,
    }
}

/// `PaymentWebhookApi` runs the inbound notification pipeline:
///
/// normalize → verify signature → dedupe → transition → record → alert
///
/// Every delivery is recorded in the ledger, whatever happens to it. Notifications for customers and operators go out
/// as events after the transition has committed.
pub struct PaymentWebhookApi<B> {
    verifier: SignatureVerifier,
    ledger: WebhookLedgerApi<B>,
    orders: OrderFlowApi<B>,
    producers: EventProducers,
}

impl<B> Debug for PaymentWebhookApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentWebhookApi ({} mode)", self.verifier.mode())
    }
}

impl<B> PaymentWebhookApi<B> {
    pub fn new(
        verifier: SignatureVerifier,
        ledger: WebhookLedgerApi<B>,
        orders: OrderFlowApi<B>,
        producers: EventProducers,
    ) -> Self {
        Self { verifier, ledger, orders, producers }
    }
}

impl<B> PaymentWebhookApi<B>
where B: FulfillmentDatabase + OrderManagement + WebhookLedger
{
    pub async fn process(&self, delivery: InboundDelivery) -> DeliveryOutcome {
        let InboundDelivery { source, remote_ip, raw_payload, notification } = delivery;
        let ip = remote_ip.as_deref().unwrap_or("unknown address").to_string();
        let notification = match notification {
            Ok(n) => n,
            Err(malformed) => {
                warn!("🔄️📨️ Malformed {source} delivery from {ip}: {}", malformed.reason);
                let entry = NewWebhookEvent {
                    source,
                    event_type: None,
                    payment_ref: malformed.payment_ref.clone(),
                    transaction_id: None,
                    claimed_status: None,
                    claimed_amount: None,
                    signature_valid: false,
                    processed: false,
                    duplicate: false,
                    outcome: "malformed".into(),
                    remote_ip: remote_ip.clone(),
                    payload: raw_payload,
                };
                self.record(entry).await;
                let anomaly = WebhookAnomalyEvent {
                    kind: AnomalyKind::MalformedEvent,
                    source,
                    payment_ref: malformed.payment_ref.clone(),
                    transaction_id: None,
                    amount: None,
                    remote_ip,
                    detail: malformed.reason.clone(),
                };
                self.alert(anomaly).await;
                return DeliveryOutcome::Malformed(malformed);
            },
        };
        let mut entry = ledger_entry(source, remote_ip.clone(), raw_payload, &notification);
        let verified = match notification.canonical_amount() {
            Some(amount) => {
                self.verifier.verify(&notification.signed_fields(&amount), notification.signature.as_deref())
            },
            None => {
                debug!("🔄️📨️ Amount {:?} for [{}] is not a decimal", notification.raw_amount, notification.payment_ref);
                false
            },
        };
        if !verified {
            warn!("🔄️📨️ {source} delivery for [{}] from {ip} failed signature verification", notification.payment_ref);
            let outcome = DeliveryOutcome::SignatureInvalid;
            entry.outcome = outcome.code().into();
            self.record(entry).await;
            self.alert_for(&notification, AnomalyKind::AuthenticationFailure, remote_ip, "The signature did not match.")
                .await;
            return outcome;
        }
        entry.signature_valid = true;

        let outcome = self.apply(&notification, remote_ip).await;
        entry.processed = outcome.is_processed();
        entry.duplicate = outcome.is_duplicate();
        entry.outcome = outcome.code().into();
        self.record(entry).await;
        outcome
    }

    /// Runs the dedupe check and the state transition for a verified notification.
    async fn apply(&self, notification: &PaymentNotification, remote_ip: Option<String>) -> DeliveryOutcome {
        let payment_ref = notification.payment_ref.as_str();
        if let ClaimedStatus::Other(status) = &notification.claimed_status {
            info!("🔄️📨️ Status '{status}' for [{payment_ref}] does not settle a payment. Recorded only.");
            return DeliveryOutcome::Ignored;
        }
        match self.ledger.is_duplicate(payment_ref, &notification.claimed_status).await {
            Ok(true) => {
                info!(
                    "🔄️📨️ [{payment_ref}] '{}' has already been applied. Duplicate ignored.",
                    notification.claimed_status
                );
                return DeliveryOutcome::Duplicate;
            },
            Ok(false) => {},
            // The transition guards itself, so carry on without the shortcut
            Err(e) => warn!("🔄️📨️ Ledger lookup for [{payment_ref}] failed: {e}"),
        }
        let result = match &notification.claimed_status {
            ClaimedStatus::Paid => self.orders.confirm_payment(notification).await,
            ClaimedStatus::Failed => self.orders.fail_payment(notification).await,
            ClaimedStatus::Other(_) => return DeliveryOutcome::Ignored,
        };
        match result {
            Ok(PaymentTransition::Applied { order, .. }) => {
                DeliveryOutcome::Applied { order_id: order.id, status: notification.claimed_status.clone() }
            },
            Ok(PaymentTransition::AlreadyApplied(order)) => {
                info!(
                    "🔄️📨️ Order {} [{payment_ref}] was settled by a concurrent delivery. Duplicate ignored.",
                    order.id
                );
                DeliveryOutcome::Duplicate
            },
            Ok(PaymentTransition::Conflict(order)) => {
                let outcome = DeliveryOutcome::Conflict {
                    order_id: order.id,
                    payment_status: order.payment_status,
                    status: order.status,
                };
                error!("🔄️📨️ '{}' for [{payment_ref}] contradicts the order: {outcome}", notification.raw_status);
                let detail =
                    format!("Provider reported '{}', but {outcome}. No changes were made.", notification.raw_status);
                self.alert_for(notification, AnomalyKind::LateContradiction, remote_ip, &detail).await;
                outcome
            },
            Ok(PaymentTransition::OrderNotFound) => {
                error!("🔄️📨️ Payment notification for unknown reference [{payment_ref}]");
                let detail = "No order carries this payment reference.";
                self.alert_for(notification, AnomalyKind::UnknownOrder, remote_ip, detail).await;
                DeliveryOutcome::UnknownOrder
            },
            Err(e) => {
                error!("🔄️📨️ Could not apply '{}' to [{payment_ref}]: {e}", notification.raw_status);
                let detail = format!("{e}. The delivery is recorded as unprocessed and may be replayed.");
                self.alert_for(notification, AnomalyKind::ProcessingError, remote_ip, &detail).await;
                DeliveryOutcome::ProcessingError(e.to_string())
            },
        }
    }

    async fn record(&self, entry: NewWebhookEvent) {
        let payment_ref = entry.payment_ref.clone();
        let source = entry.source;
        if let Err(e) = self.ledger.record(entry).await {
            error!("🔄️📨️ Could not write the ledger entry for [{}]: {e}", payment_ref.as_deref().unwrap_or("-"));
            let anomaly = WebhookAnomalyEvent {
                kind: AnomalyKind::ProcessingError,
                source,
                payment_ref,
                transaction_id: None,
                amount: None,
                remote_ip: None,
                detail: format!("The webhook ledger could not be written: {e}"),
            };
            self.alert(anomaly).await;
        }
    }

    async fn alert_for(
        &self,
        notification: &PaymentNotification,
        kind: AnomalyKind,
        remote_ip: Option<String>,
        detail: &str,
    ) {
        let anomaly = WebhookAnomalyEvent {
            kind,
            source: notification.source,
            payment_ref: Some(notification.payment_ref.clone()),
            transaction_id: notification.transaction_id.clone(),
            amount: notification.amount,
            remote_ip,
            detail: detail.to_string(),
        };
        self.alert(anomaly).await;
    }

    async fn alert(&self, anomaly: WebhookAnomalyEvent) {
        self.producers.publish(FulfillmentEvent::WebhookAnomaly(anomaly)).await;
    }
}
