use log::{trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{InventoryChange, NewProduct, OrderId, Product, StockAdjustment},
};

pub async fn insert_product(product: &NewProduct, conn: &mut SqliteConnection) -> Result<Product, SqliteDatabaseError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
            INSERT INTO products (id, name, stock, low_stock_threshold)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(product.stock)
    .bind(product.low_stock_threshold)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, SqliteDatabaseError> {
    let product =
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

/// Applies a stock delta and writes the matching inventory change. Run this inside a transaction.
///
/// The first statement is a write to the product row. In SQLite that takes the database write lock before the stock
/// level is read, so two adjustments of the same product cannot both work from the same `previous_stock`.
pub(crate) async fn adjust_stock(
    adjustment: &StockAdjustment,
    conn: &mut SqliteConnection,
) -> Result<InventoryChange, SqliteDatabaseError> {
    let pid = adjustment.product_id;
    let previous: i64 =
        sqlx::query_scalar("UPDATE products SET updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING stock")
            .bind(pid)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(SqliteDatabaseError::ProductNotFound(pid))?;
    let new_stock = previous.saturating_add(adjustment.delta).max(0);
    let applied = new_stock - previous;
    if applied != adjustment.delta {
        warn!(
            "🗃️ Product {pid} has {previous} in stock. Requested change of {} was clamped to {applied}.",
            adjustment.delta
        );
    }
    sqlx::query("UPDATE products SET stock = $1 WHERE id = $2").bind(new_stock).bind(pid).execute(&mut *conn).await?;
    let change = sqlx::query_as::<_, InventoryChange>(
        r#"
            INSERT INTO inventory_changes
                (product_id, previous_stock, new_stock, change_amount, change_type, changed_by, note, order_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(pid)
    .bind(previous)
    .bind(new_stock)
    .bind(applied)
    .bind(adjustment.change_type)
    .bind(&adjustment.changed_by)
    .bind(&adjustment.note)
    .bind(adjustment.order_id)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Product {pid} stock {previous} -> {new_stock} ({})", adjustment.change_type);
    Ok(change)
}

/// Newest first
pub async fn fetch_changes_for_product(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryChange>, SqliteDatabaseError> {
    let changes =
        sqlx::query_as::<_, InventoryChange>("SELECT * FROM inventory_changes WHERE product_id = $1 ORDER BY id DESC")
            .bind(product_id)
            .fetch_all(conn)
            .await?;
    Ok(changes)
}

pub async fn fetch_changes_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryChange>, SqliteDatabaseError> {
    let changes =
        sqlx::query_as::<_, InventoryChange>("SELECT * FROM inventory_changes WHERE order_id = $1 ORDER BY id ASC")
            .bind(order_id)
            .fetch_all(conn)
            .await?;
    Ok(changes)
}

/// Upserts the product's alert marker, but only moves it forward if the previous alert is older than `cutoff`.
/// Timestamps are unix seconds. A single statement, so two claimers cannot both see the old value.
pub(crate) async fn claim_low_stock_alert(
    product_id: i64,
    now: i64,
    cutoff: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            INSERT INTO low_stock_alerts (product_id, alerted_at) VALUES ($1, $2)
            ON CONFLICT (product_id) DO UPDATE SET alerted_at = excluded.alerted_at
            WHERE low_stock_alerts.alerted_at <= $3;
        "#,
    )
    .bind(product_id)
    .bind(now)
    .bind(cutoff)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
