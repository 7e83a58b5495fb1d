use crate::{
    db::traits::WebhookEventQueryFilter,
    db_types::{NewWebhookEvent, WebhookEvent},
    fe_api::FulfillmentError,
};

/// Storage for the append-only webhook ledger.
#[allow(async_fn_in_trait)]
pub trait WebhookLedger {
    type Error: std::error::Error + Into<FulfillmentError>;

    /// True iff an earlier delivery of the same logical event was applied, i.e. has `processed = true` and
    /// `duplicate = false`.
    async fn is_duplicate(&self, payment_ref: &str, claimed_status: &str) -> Result<bool, Self::Error>;

    async fn record_webhook_event(&self, event: NewWebhookEvent) -> Result<WebhookEvent, Self::Error>;

    async fn search_webhook_events(&self, filter: WebhookEventQueryFilter) -> Result<Vec<WebhookEvent>, Self::Error>;
}
