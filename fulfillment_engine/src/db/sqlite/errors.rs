use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Product not found: {0}")]
    ProductNotFound(i64),
    #[error("Order {0} vanished during the transaction")]
    OrderVanished(String),
    #[error("An order with payment reference {0} already exists")]
    DuplicateOrder(String),
}
