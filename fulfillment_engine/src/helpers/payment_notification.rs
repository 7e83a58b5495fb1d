//! Normalization of inbound payment notifications.
//!
//! The provider reports the same event over two channels with different shapes: a JSON body POSTed to the webhook
//! endpoint, and a query string on the browser callback. Both are reduced here to one [`PaymentNotification`], and
//! everything downstream (signature check, ledger, state machine) only ever sees that.
use ofg_common::Money;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    db_types::{ClaimedStatus, WebhookSource},
    helpers::SignedFields,
};

/// A delivery that cannot be processed because identifying fields are missing or unreadable. A bad amount is not
/// one of these: it is signed, so it fails verification instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed payment notification: {reason}")]
pub struct MalformedEvent {
    /// Whatever reference could be salvaged, for the audit trail.
    pub payment_ref: Option<String>,
    pub reason: String,
}

impl MalformedEvent {
    pub fn new<S: Into<String>>(payment_ref: Option<String>, reason: S) -> Self {
        Self { payment_ref, reason: reason.into() }
    }
}

/// The canonical, channel-independent form of a provider notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub source: WebhookSource,
    /// Correlates the notification with an order. Falls back to the transaction id if no reference was sent.
    pub payment_ref: String,
    pub transaction_id: Option<String>,
    /// The status exactly as the provider sent it. This is what was signed.
    pub raw_status: String,
    pub claimed_status: ClaimedStatus,
    /// The amount exactly as sent, if any
    pub raw_amount: Option<String>,
    /// `None` if no amount was sent, or if `raw_amount` is not a valid decimal
    pub amount: Option<Money>,
    pub timestamp: String,
    pub signature: Option<String>,
    pub event_type: Option<String>,
}

impl PaymentNotification {
    /// The amount as it appears in the signed message. `None` if an amount was sent but could not be read, in which
    /// case the notification cannot be verified.
    pub fn canonical_amount(&self) -> Option<String> {
        match (&self.raw_amount, self.amount) {
            (None, _) => Some(String::new()),
            (Some(_), Some(amount)) => Some(amount.to_string()),
            (Some(_), None) => None,
        }
    }

    pub fn signed_fields<'a>(&'a self, canonical_amount: &'a str) -> SignedFields<'a> {
        SignedFields {
            payment_ref: &self.payment_ref,
            status: &self.raw_status,
            amount: canonical_amount,
            timestamp: &self.timestamp,
        }
    }
}

/// The JSON body of a webhook delivery. Providers disagree on field names, hence the aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(alias = "reference")]
    pub payment_ref: Option<String>,
    #[serde(alias = "txn_id")]
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    /// A JSON number or a decimal string
    pub amount: Option<Value>,
    /// A JSON number (unix time) or a string
    pub timestamp: Option<Value>,
    pub signature: Option<String>,
    pub event_type: Option<String>,
}

/// The query string of a callback redirect: `?ref=&txn_id=&status=&amount=&ts=&sig=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(rename = "ref")]
    pub payment_ref: Option<String>,
    pub txn_id: Option<String>,
    pub status: Option<String>,
    pub amount: Option<String>,
    pub ts: Option<String>,
    pub sig: Option<String>,
    pub event_type: Option<String>,
}

/// Channel-independent raw fields, before validation.
struct RawNotification {
    source: WebhookSource,
    payment_ref: Option<String>,
    transaction_id: Option<String>,
    status: Option<String>,
    amount: Option<String>,
    timestamp: Option<String>,
    signature: Option<String>,
    event_type: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn scalar_to_string(field: &str, value: Option<Value>) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(format!("{field} must be a number or a string, not {other}")),
    }
}

impl RawNotification {
    fn normalize(self) -> Result<PaymentNotification, MalformedEvent> {
        let transaction_id = non_empty(self.transaction_id);
        let payment_ref = non_empty(self.payment_ref).or_else(|| transaction_id.clone());
        let Some(payment_ref) = payment_ref else {
            return Err(MalformedEvent::new(None, "no payment reference or transaction id"));
        };
        let Some(raw_status) = non_empty(self.status) else {
            return Err(MalformedEvent::new(Some(payment_ref), "no payment status"));
        };
        let raw_amount = non_empty(self.amount);
        let amount = raw_amount.as_deref().and_then(|a| a.parse::<Money>().ok());
        let claimed_status = ClaimedStatus::from(raw_status.as_str());
        Ok(PaymentNotification {
            source: self.source,
            payment_ref,
            transaction_id,
            raw_status,
            claimed_status,
            raw_amount,
            amount,
            timestamp: non_empty(self.timestamp).unwrap_or_default(),
            signature: non_empty(self.signature),
            event_type: non_empty(self.event_type),
        })
    }
}

impl WebhookPayload {
    pub fn normalize(self) -> Result<PaymentNotification, MalformedEvent> {
        let salvaged = self.payment_ref.clone().or_else(|| self.transaction_id.clone());
        let amount = scalar_to_string("amount", self.amount).map_err(|e| MalformedEvent::new(salvaged.clone(), e))?;
        let timestamp = scalar_to_string("timestamp", self.timestamp).map_err(|e| MalformedEvent::new(salvaged, e))?;
        RawNotification {
            source: WebhookSource::Webhook,
            payment_ref: self.payment_ref,
            transaction_id: self.transaction_id,
            status: self.status,
            amount,
            timestamp,
            signature: self.signature,
            event_type: self.event_type,
        }
        .normalize()
    }

    /// Parses and normalizes a raw webhook body in one step.
    pub fn from_body(body: &[u8]) -> Result<PaymentNotification, MalformedEvent> {
        let payload = serde_json::from_slice::<WebhookPayload>(body)
            .map_err(|e| MalformedEvent::new(None, format!("body is not a valid notification: {e}")))?;
        payload.normalize()
    }
}

impl CallbackParams {
    pub fn normalize(self) -> Result<PaymentNotification, MalformedEvent> {
        RawNotification {
            source: WebhookSource::Callback,
            payment_ref: self.payment_ref,
            transaction_id: self.txn_id,
            status: self.status,
            amount: self.amount,
            timestamp: self.ts,
            signature: self.sig,
            event_type: self.event_type,
        }
        .normalize()
    }
}
