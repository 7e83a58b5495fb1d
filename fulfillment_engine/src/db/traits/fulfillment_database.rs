use chrono::{DateTime, Duration, Utc};

use crate::{
    db::traits::PaymentTransition,
    db_types::{InventoryChange, NewOrder, Order, OrderId, OrderStatusType, StatusChange, StockAdjustment},
    fe_api::FulfillmentError,
};

/// This trait defines the highest level of behaviour for backends supporting the fulfillment engine.
///
/// This behaviour includes:
/// * Order intake, with the matching stock decrements
/// * Payment transitions driven by provider notifications
/// * Administrative status changes
/// * Stock adjustments and the low-stock alert window
///
/// Every method is atomic. Either all of its writes land, or none do.
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase: Clone {
    type Error: std::error::Error + Send + Sync + 'static + Into<FulfillmentError>;

    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new `pending`/`pending` order with its item snapshot, and takes each item's quantity out of stock
    /// (`order` inventory changes, linked to the new order). The initial history row is written too.
    ///
    /// Returns the order and the inventory changes that were applied, in item order.
    async fn place_order(&self, order: NewOrder) -> Result<(Order, Vec<InventoryChange>), Self::Error>;

    /// Marks the order with the given payment reference as `paid` and moves it to `processing`.
    ///
    /// The update only matches while the payment is still `pending` and the order has not been cancelled, so it can
    /// succeed at most once per order.
    async fn mark_order_paid(&self, payment_ref: &str) -> Result<PaymentTransition, Self::Error>;

    /// Marks the payment as `failed`, cancels the order and returns every item's quantity to stock, all in one
    /// transaction. The update only matches while the payment is still `pending`, so stock is restored at most once.
    async fn mark_order_payment_failed(&self, payment_ref: &str) -> Result<PaymentTransition, Self::Error>;

    /// Moves the order from `expected` to `new_status`. If the order is no longer in `expected` (someone else got
    /// there first) nothing is written and `None` is returned. Legality of the transition is the caller's concern.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatusType,
        new_status: OrderStatusType,
        change: StatusChange,
    ) -> Result<Option<Order>, Self::Error>;

    /// Applies a stock delta, clamping the result at zero, and logs exactly one inventory change.
    async fn adjust_stock(&self, adjustment: StockAdjustment) -> Result<InventoryChange, Self::Error>;

    /// Claims the right to raise a low-stock alert for the product. Returns `true` if no alert was claimed within
    /// `window` of `now`. Concurrent callers cannot both win.
    async fn claim_low_stock_alert(
        &self,
        product_id: i64,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<bool, Self::Error>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
