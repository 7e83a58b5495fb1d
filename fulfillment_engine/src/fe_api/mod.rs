pub mod errors;
pub mod inventory_api;
pub mod notification_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod order_query_api;
pub mod payment_webhook_api;
pub mod webhook_ledger_api;

pub use errors::FulfillmentError;
pub use inventory_api::{InventoryApi, LowStockPolicy};
pub use notification_api::NotificationApi;
pub use order_flow_api::OrderFlowApi;
pub use order_query_api::OrderQueryApi;
pub use payment_webhook_api::{DeliveryOutcome, InboundDelivery, PaymentWebhookApi};
pub use webhook_ledger_api::WebhookLedgerApi;
