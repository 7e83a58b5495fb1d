use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatusType, StatusChange, StatusHistoryEntry},
};

/// Inserts a new order row in the `pending`/`pending` state. This is not atomic on its own. Embed the call in a
/// transaction alongside the item and stock writes, and pass `&mut tx` as the connection argument.
pub(crate) async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let total = order
        .total()
        .ok_or_else(|| SqliteDatabaseError::QueryError(format!("The total of order {} overflows", order.payment_ref)))?;
    let result = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (customer_id, customer_email, total, payment_ref)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(&order.customer_id)
    .bind(&order.customer_email)
    .bind(total)
    .bind(&order.payment_ref)
    .fetch_one(conn)
    .await;
    match result {
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SqliteDatabaseError::DuplicateOrder(order.payment_ref.clone()))
        },
        Err(e) => Err(e.into()),
        Ok(o) => {
            trace!("🗃️ Order {} inserted for payment reference {}", o.id, o.payment_ref);
            Ok(o)
        },
    }
}

pub(crate) async fn insert_order_item(
    order_id: OrderId,
    position: i64,
    item: &NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, SqliteDatabaseError> {
    let item = sqlx::query_as::<_, OrderItem>(
        r#"
            INSERT INTO order_items (order_id, position, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(position)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order_by_id(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_ref(
    payment_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_ref = $1")
        .bind(payment_ref)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY position ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Sets `payment_status = 'paid'` and moves a pending order into `processing`.
///
/// The WHERE clause is the whole concurrency story: only a pending payment on a live order matches, so when several
/// deliveries race, exactly one of them gets a row back.
pub(crate) async fn mark_paid(
    payment_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET
                payment_status = 'paid',
                status = CASE WHEN status = 'pending' THEN 'processing' ELSE status END,
                updated_at = CURRENT_TIMESTAMP
            WHERE payment_ref = $1 AND payment_status = 'pending' AND status != 'cancelled'
            RETURNING *;
        "#,
    )
    .bind(payment_ref)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Sets `payment_status = 'failed'` and cancels the order, if the payment is still pending and the goods have not left
/// the building.
pub(crate) async fn mark_failed(
    payment_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET
                payment_status = 'failed',
                status = 'cancelled',
                updated_at = CURRENT_TIMESTAMP
            WHERE payment_ref = $1 AND payment_status = 'pending' AND status NOT IN ('shipped', 'delivered')
            RETURNING *;
        "#,
    )
    .bind(payment_ref)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Moves the order to `new_status`, but only if it is still in `expected`. Shipping fields are written on the way to
/// `shipped`, and `delivered_at` on the way to `delivered`.
pub(crate) async fn update_order_status(
    order_id: OrderId,
    expected: OrderStatusType,
    new_status: OrderStatusType,
    change: &StatusChange,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, status = ");
    builder.push_bind(new_status);
    match new_status {
        OrderStatusType::Shipped => {
            builder.push(", shipped_at = CURRENT_TIMESTAMP, tracking_number = ");
            builder.push_bind(change.tracking_number.clone());
            builder.push(", carrier = ");
            builder.push_bind(change.carrier.clone());
        },
        OrderStatusType::Delivered => {
            builder.push(", delivered_at = CURRENT_TIMESTAMP");
        },
        _ => {},
    }
    builder.push(" WHERE id = ");
    builder.push_bind(order_id);
    builder.push(" AND status = ");
    builder.push_bind(expected);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    if order.is_none() {
        debug!("🗃️ Order {order_id} was not in status '{expected}'. Status update to '{new_status}' skipped.");
    }
    Ok(order)
}

/// Appends a history row that snapshots the order's current status pair.
pub(crate) async fn insert_status_history(
    order: &Order,
    changed_by: Option<&str>,
    note: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<StatusHistoryEntry, SqliteDatabaseError> {
    let entry = sqlx::query_as::<_, StatusHistoryEntry>(
        r#"
            INSERT INTO order_status_history (order_id, status, payment_status, changed_by, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(changed_by)
    .bind(note)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

pub async fn fetch_status_history(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusHistoryEntry>, SqliteDatabaseError> {
    let history = sqlx::query_as::<_, StatusHistoryEntry>(
        "SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY id ASC",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(history)
}
