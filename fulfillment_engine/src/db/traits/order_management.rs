use crate::{
    db_types::{InventoryChange, Order, OrderId, OrderItem, Product, StatusHistoryEntry},
    fe_api::FulfillmentError,
};

/// The `OrderManagement` trait defines the behaviour for querying orders and stock in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    type Error: std::error::Error + Into<FulfillmentError>;

    async fn order_by_id(&self, order_id: OrderId) -> Result<Option<Order>, Self::Error>;

    async fn order_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Order>, Self::Error>;

    /// The order's item snapshot, in the order the items were placed.
    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, Self::Error>;

    /// Every transition the order has gone through, oldest first.
    async fn status_history(&self, order_id: OrderId) -> Result<Vec<StatusHistoryEntry>, Self::Error>;

    async fn product_by_id(&self, product_id: i64) -> Result<Option<Product>, Self::Error>;

    /// The product's stock change log, newest first.
    async fn inventory_changes(&self, product_id: i64) -> Result<Vec<InventoryChange>, Self::Error>;

    async fn inventory_changes_for_order(&self, order_id: OrderId) -> Result<Vec<InventoryChange>, Self::Error>;
}
