use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db::traits::{FulfillmentDatabase, OrderManagement},
    db_types::{ChangeType, InventoryChange, StockAdjustment},
    events::{EventProducers, FulfillmentEvent, LowStockEvent},
    fe_api::FulfillmentError,
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct LowStockPolicy {
    /// Used for products that do not carry their own threshold
    pub default_threshold: i64,
    /// At most one alert per product within this window
    pub alert_window: Duration,
}

impl Default for LowStockPolicy {
    fn default() -> Self {
        Self { default_threshold: DEFAULT_LOW_STOCK_THRESHOLD, alert_window: Duration::hours(24) }
    }
}

/// `InventoryApi` owns the stock counters: manual and bulk adjustments, the change log, and low-stock alerts.
pub struct InventoryApi<B> {
    db: B,
    producers: EventProducers,
    policy: LowStockPolicy,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi ({:?})", self.policy)
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B, producers: EventProducers, policy: LowStockPolicy) -> Self {
        Self { db, producers, policy }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> InventoryApi<B>
where B: OrderManagement
{
    /// The product's change log, newest first.
    pub async fn history(&self, product_id: i64) -> Result<Vec<InventoryChange>, FulfillmentError> {
        self.db
            .product_by_id(product_id)
            .await
            .map_err(FulfillmentError::backend)?
            .ok_or(FulfillmentError::ProductNotFound(product_id))?;
        self.db.inventory_changes(product_id).await.map_err(Into::into)
    }
}

impl<B> InventoryApi<B>
where B: FulfillmentDatabase + OrderManagement
{
    /// Applies `delta` to the product's stock and logs the change.
    ///
    /// Decrements clamp at zero, in which case the logged `change_amount` is what was actually taken. Restorations must
    /// be positive. A decrement that leaves the product at or below its threshold raises a low-stock alert, at most
    /// once per product per alert window.
    pub async fn adjust(
        &self,
        product_id: i64,
        delta: i64,
        change_type: ChangeType,
        actor: Option<String>,
        note: Option<String>,
    ) -> Result<InventoryChange, FulfillmentError> {
        if delta == 0 {
            return Err(FulfillmentError::InvalidQuantity("a stock adjustment cannot be zero".into()));
        }
        if change_type == ChangeType::Restore && delta < 0 {
            return Err(FulfillmentError::InvalidQuantity("a restoration must be positive".into()));
        }
        let mut adjustment = StockAdjustment::new(product_id, delta, change_type).with_actor(actor);
        adjustment.note = note;
        let change = self.db.adjust_stock(adjustment).await.map_err(FulfillmentError::backend)?;
        info!(
            "🔄️📦️ Product {product_id} stock {} -> {} ({change_type}, by {})",
            change.previous_stock,
            change.new_stock,
            change.changed_by.as_deref().unwrap_or("system")
        );
        if delta < 0 {
            self.signal_low_stock(&change).await;
        }
        Ok(change)
    }

    /// Raises a low-stock alert if `change` left the product at or below its threshold and no alert went out within
    /// the window. The stock change has already committed, so failures here are only logged.
    pub(crate) async fn signal_low_stock(&self, change: &InventoryChange) {
        let product = match self.db.product_by_id(change.product_id).await {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(e) => {
                warn!("🔄️📦️ Could not load product {} for the low-stock check: {e}", change.product_id);
                return;
            },
        };
        let threshold = product.low_stock_threshold.unwrap_or(self.policy.default_threshold);
        if change.new_stock > threshold {
            return;
        }
        match self.db.claim_low_stock_alert(product.id, Utc::now(), self.policy.alert_window).await {
            Ok(true) => {
                info!("🔄️📦️ Product {} ({}) is low on stock: {} left", product.id, product.name, change.new_stock);
                self.producers.publish(FulfillmentEvent::LowStock(LowStockEvent { product, threshold })).await;
            },
            Ok(false) => debug!("🔄️📦️ Product {} is low on stock, but operators were already alerted", product.id),
            Err(e) => warn!("🔄️📦️ Could not claim the low-stock alert for product {}: {e}", product.id),
        }
    }
}
