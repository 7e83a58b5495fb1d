use std::fmt::Display;

use thiserror::Error;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::SqliteDatabaseError;
use crate::db_types::{OrderId, OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum FulfillmentError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Notification {0} does not exist")]
    NotificationNotFound(i64),
    #[error("The order is already {0}")]
    TransitionNoOp(OrderStatusType),
    #[error("An order cannot move from {from} to {to}")]
    TransitionForbidden { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} was changed by someone else in the meantime. Reload it and try again.")]
    ConcurrentModification(OrderId),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    #[error("An order with payment reference {0} already exists")]
    DuplicateOrder(String),
}

impl FulfillmentError {
    pub fn database<E: Display>(e: E) -> Self {
        Self::DatabaseError(e.to_string())
    }

    /// Converts a storage backend error. Handy with `map_err`, where `Into::into` cannot pick a target type.
    pub fn backend<E: Into<Self>>(e: E) -> Self {
        e.into()
    }
}

#[cfg(feature = "sqlite")]
impl From<SqliteDatabaseError> for FulfillmentError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::ProductNotFound(id) => Self::ProductNotFound(id),
            SqliteDatabaseError::DuplicateOrder(payment_ref) => Self::DuplicateOrder(payment_ref),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
