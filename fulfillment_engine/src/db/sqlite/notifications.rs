use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewNotification, Notification, Recipient},
};

pub(crate) async fn insert_notification(
    notification: &NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, Notification>(
        r#"
            INSERT INTO notifications (recipient_kind, recipient_id, notification_type, title, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(notification.recipient.kind())
    .bind(notification.recipient.customer_id())
    .bind(notification.notification_type)
    .bind(&notification.title)
    .bind(&notification.message)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_notifications(
    recipient: &Recipient,
    unread_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, Notification>(
        r#"
            SELECT * FROM notifications
            WHERE recipient_kind = $1 AND recipient_id IS $2 AND ($3 = 0 OR is_read = 0)
            ORDER BY id DESC;
        "#,
    )
    .bind(recipient.kind())
    .bind(recipient.customer_id())
    .bind(unread_only)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub(crate) async fn mark_read(id: i64, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}
