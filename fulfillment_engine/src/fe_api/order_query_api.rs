use crate::{
    db::traits::OrderManagement,
    db_types::{OrderId, StatusHistoryEntry},
    fe_api::{order_objects::OrderWithItems, FulfillmentError},
};

/// Read-only queries over orders.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn order(&self, order_id: OrderId) -> Result<OrderWithItems, FulfillmentError> {
        let order = self
            .db
            .order_by_id(order_id)
            .await
            .map_err(FulfillmentError::backend)?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        let items = self.db.order_items(order_id).await.map_err(FulfillmentError::backend)?;
        Ok(OrderWithItems { order, items })
    }

    /// Every status change the order has been through, oldest first.
    pub async fn history(&self, order_id: OrderId) -> Result<Vec<StatusHistoryEntry>, FulfillmentError> {
        let history = self.db.status_history(order_id).await.map_err(FulfillmentError::backend)?;
        // Every order has at least its creation row
        if history.is_empty() {
            return Err(FulfillmentError::OrderNotFound(order_id));
        }
        Ok(history)
    }
}
