use std::{fmt::Debug, time::Duration};

use cucumber::World;
use fulfillment_engine::{
    db_types::{Notification, Order, Recipient},
    events::{DeliveryPolicy, EventHandlers, EventHooks, LogMessageSender, NotificationDispatcher},
    fe_api::webhook_ledger_api::DEFAULT_MAX_STORED_PAYLOAD,
    helpers::{DeploymentMode, SignatureVerifier},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    DeliveryOutcome,
    FulfillmentError,
    InventoryApi,
    LowStockPolicy,
    NotificationApi,
    OrderFlowApi,
    OrderManagement,
    OrderQueryApi,
    PaymentWebhookApi,
    SqliteDatabase,
    WebhookLedgerApi,
};
use log::*;
use ofg_common::Secret;
use tokio::task::JoinHandle;

pub const TEST_SECRET: &str = "whsec_test";
pub const TEST_TIMESTAMP: &str = "2026-03-01T10:00:00Z";

#[derive(Default, Debug, World)]
pub struct FulfillmentWorld {
    pub system: Option<FulfillmentSystem>,
    pub last_outcome: Option<DeliveryOutcome>,
    pub last_error: Option<FulfillmentError>,
}

impl FulfillmentWorld {
    pub fn system(&self) -> &FulfillmentSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn last_outcome(&self) -> &DeliveryOutcome {
        self.last_outcome.as_ref().expect("No delivery has been processed yet")
    }
}

/// The engine wired up the way the server wires it, minus HTTP.
pub struct FulfillmentSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub verifier: SignatureVerifier,
    pub webhooks: PaymentWebhookApi<SqliteDatabase>,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub ledger: WebhookLedgerApi<SqliteDatabase>,
    pub queries: OrderQueryApi<SqliteDatabase>,
    pub notifications: NotificationApi<SqliteDatabase>,
    pub handlers: Vec<JoinHandle<()>>,
}

impl Debug for FulfillmentSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentSystem ({})", self.db_path)
    }
}

impl FulfillmentSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("🚀️ Created database: {url}");

        let mut hooks = EventHooks::default();
        let dispatcher = NotificationDispatcher::new(db.clone(), LogMessageSender, DeliveryPolicy::default());
        hooks.add_handler(dispatcher.into_hook());
        let handlers = EventHandlers::new(64, hooks);
        let producers = handlers.producers();
        let handlers = handlers.start_handlers();

        let verifier = SignatureVerifier::new(Secret::new(TEST_SECRET.to_string()), DeploymentMode::Test);
        let ledger = WebhookLedgerApi::new(db.clone(), DEFAULT_MAX_STORED_PAYLOAD);
        let orders = OrderFlowApi::new(db.clone(), producers.clone(), LowStockPolicy::default());
        let webhooks = PaymentWebhookApi::new(
            verifier.clone(),
            WebhookLedgerApi::new(db.clone(), DEFAULT_MAX_STORED_PAYLOAD),
            OrderFlowApi::new(db.clone(), producers.clone(), LowStockPolicy::default()),
            producers.clone(),
        );
        let inventory = InventoryApi::new(db.clone(), producers, LowStockPolicy::default());
        let queries = OrderQueryApi::new(db.clone());
        let notifications = NotificationApi::new(db.clone());
        Self { db_path: url, db, verifier, webhooks, orders, inventory, ledger, queries, notifications, handlers }
    }

    pub async fn order(&self, payment_ref: &str) -> Order {
        self.db
            .order_by_payment_ref(payment_ref)
            .await
            .expect("Error fetching order")
            .unwrap_or_else(|| panic!("No order for {payment_ref}"))
    }

    /// Notifications are written by the dispatcher task, so poll until at least `expected` show up. A short grace
    /// period afterwards lets any extras land before the caller counts them.
    pub async fn wait_for_notifications(&self, recipient: &Recipient, expected: usize) -> Vec<Notification> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            let found =
                self.notifications.notifications_for(recipient, false).await.expect("Error fetching notifications");
            if found.len() >= expected || tokio::time::Instant::now() > deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.notifications.notifications_for(recipient, false).await.expect("Error fetching notifications")
    }
}
