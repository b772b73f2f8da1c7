use shared::models::PaymentTarget;
use sqlx::PgPool;

use crate::db::{CheckoutSession, RepoError, RepoResult};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    target_type: String,
    target_id: i64,
    order_id: i64,
    amount: i64,
    service_fee: i64,
    created_at: i64,
}

pub async fn record_session(pool: &PgPool, session: &CheckoutSession) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO checkout_sessions
            (id, target_type, target_id, order_id, amount, service_fee, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(&session.id)
    .bind(session.target.kind())
    .bind(session.target.id())
    .bind(session.order_id)
    .bind(session.amount)
    .bind(session.service_fee)
    .bind(session.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_session(pool: &PgPool, id: &str) -> RepoResult<Option<CheckoutSession>> {
    let row: Option<SessionRow> = sqlx::query_as(
        "SELECT id, target_type, target_id, order_id, amount, service_fee, created_at
         FROM checkout_sessions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| -> RepoResult<CheckoutSession> {
        let target = PaymentTarget::from_db(&row.target_type, row.target_id).ok_or_else(|| {
            RepoError::Database(format!("invalid checkout target {}", row.target_type))
        })?;
        Ok(CheckoutSession {
            id: row.id,
            target,
            order_id: row.order_id,
            amount: row.amount,
            service_fee: row.service_fee,
            created_at: row.created_at,
        })
    })
    .transpose()
}

/// Idempotency: INSERT first, check rows_affected
pub async fn record_event(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id, event_type, processed_at)
         VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
