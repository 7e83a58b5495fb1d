//! #  Database management and control.
//!
//! This module defines the interface contracts that storage *backends* must satisfy to drive the fulfillment engine.
//!
//! * [`FulfillmentDatabase`] holds every state-changing operation: order intake, payment transitions, administrative
//!   status changes and stock adjustments. Each method is one atomic unit of work. Guards live inside the write
//!   statements, so racing callers cannot both succeed.
//! * [`OrderManagement`] provides read-only queries over orders, their items and history, and the inventory ledger.
//! * [`WebhookLedger`] is the append-only record of every inbound payment notification, and the idempotency check that
//!   sits in front of the state machine.
//! * [`NotificationManagement`] stores in-app notifications. Its futures are `Send`, because the notification
//!   dispatcher runs them on spawned tasks.
mod data_objects;
mod fulfillment_database;
mod notification_management;
mod order_management;
mod webhook_ledger;

pub use data_objects::{PaymentTransition, WebhookEventQueryFilter};
pub use fulfillment_database::FulfillmentDatabase;
pub use notification_management::NotificationManagement;
pub use order_management::OrderManagement;
pub use webhook_ledger::WebhookLedger;
