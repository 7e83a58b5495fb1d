use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{inventory, new_pool, notifications, orders, webhook_events, SqliteDatabaseError};
use crate::{
    db::traits::{
        FulfillmentDatabase,
        NotificationManagement,
        OrderManagement,
        PaymentTransition,
        WebhookEventQueryFilter,
        WebhookLedger,
    },
    db_types::{
        ChangeType,
        InventoryChange,
        NewNotification,
        NewOrder,
        NewProduct,
        NewWebhookEvent,
        Notification,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentStatus,
        Product,
        Recipient,
        StatusChange,
        StatusHistoryEntry,
        StockAdjustment,
        WebhookEvent,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Created new database connection pool for {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    /// Adds a product to the stock table. Catalog management lives elsewhere; this exists for seeding and tests.
    pub async fn insert_product(&self, product: NewProduct) -> Result<Product, SqliteDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let product = inventory::insert_product(&product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }
}

/// Explains why a guarded payment update matched nothing.
fn unapplied_transition(order: Option<Order>, target: PaymentStatus) -> PaymentTransition {
    match order {
        None => PaymentTransition::OrderNotFound,
        Some(order) if order.payment_status == target => PaymentTransition::AlreadyApplied(order),
        Some(order) => PaymentTransition::Conflict(order),
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn place_order(&self, order: NewOrder) -> Result<(Order, Vec<InventoryChange>), Self::Error> {
        let mut tx = self.pool.begin().await?;
        let record = orders::insert_order(&order, &mut tx).await?;
        let mut changes = Vec::with_capacity(order.items.len());
        for (position, item) in (1i64..).zip(order.items.iter()) {
            let adjustment = StockAdjustment::new(item.product_id, -item.quantity, ChangeType::Order)
                .with_note(format!("Order {}", record.id))
                .for_order(record.id);
            changes.push(inventory::adjust_stock(&adjustment, &mut tx).await?);
            orders::insert_order_item(record.id, position, item, &mut tx).await?;
        }
        orders::insert_status_history(&record, None, Some("Order placed"), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} ({}) saved with {} items", record.id, record.payment_ref, changes.len());
        Ok((record, changes))
    }

    async fn mark_order_paid(&self, payment_ref: &str) -> Result<PaymentTransition, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let transition = match orders::mark_paid(payment_ref, &mut tx).await? {
            Some(order) => {
                orders::insert_status_history(&order, None, Some("Payment confirmed by provider"), &mut tx).await?;
                debug!("🗃️ Order {} marked as paid", order.id);
                PaymentTransition::Applied { order, restored: vec![] }
            },
            None => {
                let order = orders::fetch_order_by_payment_ref(payment_ref, &mut tx).await?;
                unapplied_transition(order, PaymentStatus::Paid)
            },
        };
        tx.commit().await?;
        Ok(transition)
    }

    async fn mark_order_payment_failed(&self, payment_ref: &str) -> Result<PaymentTransition, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let transition = match orders::mark_failed(payment_ref, &mut tx).await? {
            Some(order) => {
                let items = orders::fetch_order_items(order.id, &mut tx).await?;
                let mut restored = Vec::with_capacity(items.len());
                for item in &items {
                    let adjustment = StockAdjustment::new(item.product_id, item.quantity, ChangeType::Restore)
                        .with_note(format!("Payment failed for order {}", order.id))
                        .for_order(order.id);
                    restored.push(inventory::adjust_stock(&adjustment, &mut tx).await?);
                }
                orders::insert_status_history(&order, None, Some("Payment failed. Stock restored."), &mut tx).await?;
                debug!("🗃️ Order {} cancelled after payment failure. {} items restored", order.id, restored.len());
                PaymentTransition::Applied { order, restored }
            },
            None => {
                let order = orders::fetch_order_by_payment_ref(payment_ref, &mut tx).await?;
                unapplied_transition(order, PaymentStatus::Failed)
            },
        };
        tx.commit().await?;
        Ok(transition)
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatusType,
        new_status: OrderStatusType,
        change: StatusChange,
    ) -> Result<Option<Order>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_order_status(order_id, expected, new_status, &change, &mut tx).await?;
        if let Some(order) = &order {
            orders::insert_status_history(order, change.changed_by.as_deref(), change.note.as_deref(), &mut tx)
                .await?;
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn adjust_stock(&self, adjustment: StockAdjustment) -> Result<InventoryChange, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let change = inventory::adjust_stock(&adjustment, &mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn claim_low_stock_alert(
        &self,
        product_id: i64,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let cutoff = now - window;
        inventory::claim_low_stock_alert(product_id, now.timestamp(), cutoff.timestamp(), &mut conn).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn order_by_id(&self, order_id: OrderId) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(order_id, &mut conn).await
    }

    async fn order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_payment_ref(payment_ref, &mut conn).await
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn status_history(&self, order_id: OrderId) -> Result<Vec<StatusHistoryEntry>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_status_history(order_id, &mut conn).await
    }

    async fn product_by_id(&self, product_id: i64) -> Result<Option<Product>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_product(product_id, &mut conn).await
    }

    async fn inventory_changes(&self, product_id: i64) -> Result<Vec<InventoryChange>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_changes_for_product(product_id, &mut conn).await
    }

    async fn inventory_changes_for_order(&self, order_id: OrderId) -> Result<Vec<InventoryChange>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_changes_for_order(order_id, &mut conn).await
    }
}

impl WebhookLedger for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn is_duplicate(&self, payment_ref: &str, claimed_status: &str) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::applied_event_exists(payment_ref, claimed_status, &mut conn).await
    }

    async fn record_webhook_event(&self, event: NewWebhookEvent) -> Result<WebhookEvent, Self::Error> {
        // RETURNING hands the row back before the statement completes, so commit explicitly before reporting success
        let mut tx = self.pool.begin().await?;
        let event = webhook_events::insert_webhook_event(&event, &mut tx).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn search_webhook_events(&self, filter: WebhookEventQueryFilter) -> Result<Vec<WebhookEvent>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::search_webhook_events(filter, &mut conn).await
    }
}

impl NotificationManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let notification = notifications::insert_notification(&notification, &mut tx).await?;
        tx.commit().await?;
        Ok(notification)
    }

    async fn fetch_notifications(
        &self,
        recipient: &Recipient,
        unread_only: bool,
    ) -> Result<Vec<Notification>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        notifications::fetch_notifications(recipient, unread_only, &mut conn).await
    }

    async fn mark_notification_read(&self, id: i64) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        notifications::mark_read(id, &mut conn).await
    }
}
