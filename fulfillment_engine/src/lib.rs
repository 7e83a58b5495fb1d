//! Order Fulfillment Engine
//!
//! The fulfillment engine ingests payment-provider notifications and drives orders through their lifecycle. It is
//! independent of the HTTP layer that feeds it.
//!
//! The library is divided into these sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should rarely need to touch
//!    the database directly. Use the engine APIs instead. The data types stored in the database are defined in
//!    [`mod@db_types`] and are public.
//! 2. The engine APIs ([`mod@fe_api`]):
//!    * [`PaymentWebhookApi`] runs the inbound notification pipeline: signature check, dedupe, transition, audit.
//!    * [`OrderFlowApi`] is the order state machine: placement, payment outcomes and operator status changes.
//!    * [`InventoryApi`] owns stock levels, the stock change log and low-stock alerts.
//!    * [`WebhookLedgerApi`] is the append-only record of every delivery, and the idempotency check.
//!    * [`OrderQueryApi`] and [`NotificationApi`] are read-only views for operators and customers.
//! 3. Helpers ([`mod@helpers`]) for signature verification and for normalizing the provider's two notification
//!    shapes into one.
//!
//! State changes are published as [`events::FulfillmentEvent`]s once they have committed. The
//! [`events::NotificationDispatcher`] subscribes to these and turns them into in-app notifications and emails.
mod db;

pub mod db_types;
pub mod events;
pub mod fe_api;
pub mod helpers;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    FulfillmentDatabase,
    NotificationManagement,
    OrderManagement,
    PaymentTransition,
    WebhookEventQueryFilter,
    WebhookLedger,
};
pub use fe_api::{
    DeliveryOutcome,
    FulfillmentError,
    InboundDelivery,
    InventoryApi,
    LowStockPolicy,
    NotificationApi,
    OrderFlowApi,
    OrderQueryApi,
    PaymentWebhookApi,
    WebhookLedgerApi,
};
