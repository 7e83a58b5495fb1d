use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::WebhookEventQueryFilter},
    db_types::{NewWebhookEvent, WebhookEvent},
};

const DEFAULT_SEARCH_LIMIT: i64 = 100;

pub(crate) async fn insert_webhook_event(
    event: &NewWebhookEvent,
    conn: &mut SqliteConnection,
) -> Result<WebhookEvent, SqliteDatabaseError> {
    let event = sqlx::query_as::<_, WebhookEvent>(
        r#"
            INSERT INTO webhook_events (
                source,
                event_type,
                payment_ref,
                transaction_id,
                claimed_status,
                claimed_amount,
                signature_valid,
                processed,
                duplicate,
                outcome,
                remote_ip,
                payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(event.source)
    .bind(&event.event_type)
    .bind(&event.payment_ref)
    .bind(&event.transaction_id)
    .bind(&event.claimed_status)
    .bind(event.claimed_amount)
    .bind(event.signature_valid)
    .bind(event.processed)
    .bind(event.duplicate)
    .bind(&event.outcome)
    .bind(&event.remote_ip)
    .bind(&event.payload)
    .fetch_one(conn)
    .await?;
    Ok(event)
}

pub async fn applied_event_exists(
    payment_ref: &str,
    claimed_status: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let exists: bool = sqlx::query_scalar(
        r#"
            SELECT EXISTS (
                SELECT 1 FROM webhook_events
                WHERE payment_ref = $1 AND claimed_status = $2 AND processed = 1 AND duplicate = 0
            );
        "#,
    )
    .bind(payment_ref)
    .bind(claimed_status)
    .fetch_one(conn)
    .await?;
    Ok(exists)
}

/// Fetches ledger entries matching the filter, newest first.
pub async fn search_webhook_events(
    query: WebhookEventQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<WebhookEvent>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM webhook_events ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(payment_ref) = query.payment_ref {
        where_clause.push("payment_ref = ");
        where_clause.push_bind_unseparated(payment_ref);
    }
    if let Some(source) = query.source {
        where_clause.push("source = ");
        where_clause.push_bind_unseparated(source);
    }
    if let Some(valid) = query.signature_valid {
        where_clause.push("signature_valid = ");
        where_clause.push_bind_unseparated(valid);
    }
    if let Some(processed) = query.processed {
        where_clause.push("processed = ");
        where_clause.push_bind_unseparated(processed);
    }
    if let Some(duplicate) = query.duplicate {
        where_clause.push("duplicate = ");
        where_clause.push_bind_unseparated(duplicate);
    }
    if let Some(since) = query.since {
        // received_at is written by CURRENT_TIMESTAMP, so normalise the bound value to the same text format
        where_clause.push("received_at >= datetime(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("received_at <= datetime(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1));

    trace!("🗃️ Executing query: {}", builder.sql());
    let events = builder.build_query_as::<WebhookEvent>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_webhook_events: {}", events.len());
    Ok(events)
}
