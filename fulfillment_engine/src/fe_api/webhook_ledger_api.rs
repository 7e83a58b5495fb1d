use std::fmt::Debug;

use log::*;
use ofg_common::helpers::truncate_utf8;

use crate::{
    db::traits::{WebhookEventQueryFilter, WebhookLedger},
    db_types::{ClaimedStatus, NewWebhookEvent, WebhookEvent},
    fe_api::FulfillmentError,
};

pub const DEFAULT_MAX_STORED_PAYLOAD: usize = 4096;

/// `WebhookLedgerApi` is the idempotency store and audit trail for provider notifications.
pub struct WebhookLedgerApi<B> {
    db: B,
    max_payload_bytes: usize,
}

impl<B> Debug for WebhookLedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookLedgerApi (max payload {} bytes)", self.max_payload_bytes)
    }
}

impl<B> WebhookLedgerApi<B> {
    pub fn new(db: B, max_payload_bytes: usize) -> Self {
        Self { db, max_payload_bytes }
    }
}

impl<B> WebhookLedgerApi<B>
where B: WebhookLedger
{
    /// True if this logical event, i.e. the pair `(payment_ref, claimed_status)`, has already been applied. The
    /// channel it arrived on plays no part.
    pub async fn is_duplicate(&self, payment_ref: &str, status: &ClaimedStatus) -> Result<bool, FulfillmentError> {
        self.db.is_duplicate(payment_ref, status.as_str()).await.map_err(Into::into)
    }

    /// Appends a delivery to the ledger. The raw payload is cut to the configured size on a character boundary.
    pub async fn record(&self, mut event: NewWebhookEvent) -> Result<WebhookEvent, FulfillmentError> {
        if event.payload.len() > self.max_payload_bytes {
            trace!("🔄️📨️ Payload of {} bytes truncated for the ledger", event.payload.len());
            event.payload = truncate_utf8(&event.payload, self.max_payload_bytes).to_string();
        }
        let entry = self.db.record_webhook_event(event).await.map_err(FulfillmentError::backend)?;
        debug!(
            "🔄️📨️ Ledger entry #{} for [{}]: {}",
            entry.id,
            entry.payment_ref.as_deref().unwrap_or("-"),
            entry.outcome
        );
        Ok(entry)
    }

    pub async fn search(&self, filter: WebhookEventQueryFilter) -> Result<Vec<WebhookEvent>, FulfillmentError> {
        self.db.search_webhook_events(filter).await.map_err(Into::into)
    }
}
