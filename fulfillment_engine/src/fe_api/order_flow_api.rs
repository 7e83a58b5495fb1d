use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{FulfillmentDatabase, OrderManagement, PaymentTransition},
    db_types::{NewOrder, Order, OrderId, OrderStatusType, StatusChange},
    events::{EventProducers, FulfillmentEvent, OrderPaidEvent, OrderStatusChangedEvent, PaymentFailedEvent},
    fe_api::{inventory_api::LowStockPolicy, FulfillmentError, InventoryApi},
    helpers::PaymentNotification,
};

/// `OrderFlowApi` is the order state machine. It places orders, applies payment outcomes reported by the provider,
/// and carries out administrative status changes.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    inventory: InventoryApi<B>,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, low_stock: LowStockPolicy) -> Self {
        let inventory = InventoryApi::new(db.clone(), producers.clone(), low_stock);
        Self { db, producers, inventory }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn db(&self) -> &B {
        &self.db
    }
}

/// Checks an administrative status change against the order lifecycle.
///
/// | From \ To  | Pending | Processing | Shipped | Delivered | Cancelled |
/// |------------|---------|------------|---------|-----------|-----------|
/// | Pending    | no-op   | ok         | -       | -         | ok        |
/// | Processing | -       | no-op      | ok      | -         | ok        |
/// | Shipped    | -       | -          | no-op   | ok        | ok        |
/// | Delivered  | -       | -          | -       | no-op     | -         |
/// | Cancelled  | -       | -          | -       | -         | no-op     |
///
/// `-` is [`FulfillmentError::TransitionForbidden`]; no-op is [`FulfillmentError::TransitionNoOp`].
pub fn check_transition(from: OrderStatusType, to: OrderStatusType) -> Result<(), FulfillmentError> {
    use OrderStatusType::*;
    match (from, to) {
        (a, b) if a == b => Err(FulfillmentError::TransitionNoOp(a)),
        (Pending, Processing) | (Processing, Shipped) | (Shipped, Delivered) => Ok(()),
        (Pending | Processing | Shipped, Cancelled) => Ok(()),
        (from, to) => Err(FulfillmentError::TransitionForbidden { from, to }),
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), FulfillmentError> {
    if order.payment_ref.trim().is_empty() {
        return Err(FulfillmentError::InvalidOrder("payment reference is required".into()));
    }
    if order.customer_id.trim().is_empty() {
        return Err(FulfillmentError::InvalidOrder("customer id is required".into()));
    }
    if order.items.is_empty() {
        return Err(FulfillmentError::InvalidOrder("an order needs at least one item".into()));
    }
    if let Some(item) = order.items.iter().find(|i| i.quantity <= 0) {
        return Err(FulfillmentError::InvalidQuantity(format!(
            "product {} has quantity {}",
            item.product_id, item.quantity
        )));
    }
    if let Some(item) = order.items.iter().find(|i| i.unit_price.is_negative()) {
        return Err(FulfillmentError::InvalidOrder(format!("product {} has a negative price", item.product_id)));
    }
    if order.total().is_none() {
        return Err(FulfillmentError::InvalidOrder("the order total is too large".into()));
    }
    Ok(())
}

impl<B> OrderFlowApi<B>
where B: FulfillmentDatabase + OrderManagement
{
    /// Places a new order and takes its items out of stock, in one transaction.
    ///
    /// The item snapshot (quantity and unit price) is frozen here. Nothing downstream reads prices from the catalog
    /// again.
    pub async fn place_order(&self, order: NewOrder) -> Result<Order, FulfillmentError> {
        validate_new_order(&order)?;
        let payment_ref = order.payment_ref.clone();
        let (order, changes) = self.db.place_order(order).await.map_err(FulfillmentError::backend)?;
        info!(
            "🔄️📦️ Order {} placed by customer {} for {} ({payment_ref})",
            order.id, order.customer_id, order.total
        );
        for change in &changes {
            self.inventory.signal_low_stock(change).await;
        }
        Ok(order)
    }

    /// Applies a verified success notification. See [`FulfillmentDatabase::mark_order_paid`] for the guard.
    pub async fn confirm_payment(
        &self,
        notification: &PaymentNotification,
    ) -> Result<PaymentTransition, FulfillmentError> {
        let payment_ref = notification.payment_ref.as_str();
        trace!("🔄️✅️ Payment for [{payment_ref}] is being marked as paid");
        let transition = self.db.mark_order_paid(payment_ref).await.map_err(FulfillmentError::backend)?;
        if let PaymentTransition::Applied { order, .. } = &transition {
            info!("🔄️✅️ Order {} [{payment_ref}] is paid and now processing", order.id);
            let event = OrderPaidEvent {
                order: order.clone(),
                transaction_id: notification.transaction_id.clone(),
                amount: notification.amount,
            };
            self.producers.publish(FulfillmentEvent::OrderPaid(event)).await;
        }
        Ok(transition)
    }

    /// Applies a verified failure notification: the order is cancelled and every item goes back into stock, in one
    /// transaction. See [`FulfillmentDatabase::mark_order_payment_failed`] for the guard.
    pub async fn fail_payment(
        &self,
        notification: &PaymentNotification,
    ) -> Result<PaymentTransition, FulfillmentError> {
        let payment_ref = notification.payment_ref.as_str();
        trace!("🔄️❌️ Payment for [{payment_ref}] is being marked as failed");
        let transition = self.db.mark_order_payment_failed(payment_ref).await.map_err(FulfillmentError::backend)?;
        if let PaymentTransition::Applied { order, restored } = &transition {
            info!(
                "🔄️❌️ Order {} [{payment_ref}] cancelled after payment failure. {} item lines restored to stock.",
                order.id,
                restored.len()
            );
            let event = PaymentFailedEvent {
                order: order.clone(),
                restored: restored.clone(),
                transaction_id: notification.transaction_id.clone(),
                amount: notification.amount,
                provider_status: notification.raw_status.clone(),
            };
            self.producers.publish(FulfillmentEvent::PaymentFailed(event)).await;
        }
        Ok(transition)
    }

    /// Changes the status of an order on behalf of an operator.
    ///
    /// The allowed moves are listed in [`check_transition`]. Side effects, per target status:
    ///
    /// * `Shipped`: `shipped_at` is set, along with the tracking number and carrier in `change`, if given. The
    ///   customer is notified (in-app and email).
    /// * `Delivered`: `delivered_at` is set and the customer is notified.
    /// * `Cancelled`: the customer is notified. Stock and payment status are left alone. If the provider later
    ///   reports the payment as failed, that is when the stock comes back.
    ///
    /// Every change appends a history row naming `change.changed_by`.
    ///
    /// The update only applies if the order is still in the status it was read in. If another operator got there first
    /// the call fails with [`FulfillmentError::ConcurrentModification`] and nothing is written.
    pub async fn modify_status_for_order(
        &self,
        order_id: OrderId,
        new_status: OrderStatusType,
        change: StatusChange,
    ) -> Result<Order, FulfillmentError> {
        let order = self
            .db
            .order_by_id(order_id)
            .await
            .map_err(FulfillmentError::backend)?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        check_transition(order.status, new_status)?;
        let changed_by = change.changed_by.clone();
        let updated = self
            .db
            .update_order_status(order_id, order.status, new_status, change)
            .await
            .map_err(FulfillmentError::backend)?
            .ok_or(FulfillmentError::ConcurrentModification(order_id))?;
        info!(
            "🔄️📦️ Order {order_id} moved from {} to {new_status} by {}",
            order.status,
            changed_by.as_deref().unwrap_or("system")
        );
        let event = OrderStatusChangedEvent { previous: order.status, order: updated.clone(), changed_by };
        self.producers.publish(FulfillmentEvent::StatusChanged(event)).await;
        Ok(updated)
    }
}
