//! Order, reservation and selection storage
//!
//! Paid flags only move `false → true`, always through a conditional
//! `UPDATE … WHERE paid = FALSE`.

use std::collections::HashMap;

use shared::models::{Order, OrderQuery, Reservation, Selection};
use sqlx::PgPool;

use super::weekday;
use crate::db::{NewOrder, RepoError, RepoResult, ReservationPaid};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    profile_id: i64,
    form_id: i64,
    name: String,
    grade: String,
    total: i64,
    paid: bool,
    created_at: i64,
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: i64,
    order_id: i64,
    weekday: i16,
    paid: bool,
}

#[derive(sqlx::FromRow)]
struct SelectionRow {
    reservation_id: i64,
    food_item_id: i64,
    food_item_name: String,
    unit_price: i64,
    quantity: i64,
}

const ORDER_COLUMNS: &str =
    "o.id, o.profile_id, o.form_id, o.name, o.grade, o.total, o.paid, o.created_at";

/// Attach reservations and selections to order rows, keeping row order
async fn load(pool: &PgPool, rows: Vec<OrderRow>) -> RepoResult<Vec<Order>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let order_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let reservation_rows: Vec<ReservationRow> = sqlx::query_as(
        "SELECT id, order_id, weekday, paid FROM reservations
         WHERE order_id = ANY($1) ORDER BY order_id, weekday",
    )
    .bind(&order_ids)
    .fetch_all(pool)
    .await?;

    let reservation_ids: Vec<i64> = reservation_rows.iter().map(|r| r.id).collect();
    let selection_rows: Vec<SelectionRow> = sqlx::query_as(
        "SELECT reservation_id, food_item_id, food_item_name, unit_price, quantity
         FROM selections WHERE reservation_id = ANY($1)
         ORDER BY reservation_id, food_item_name, food_item_id",
    )
    .bind(&reservation_ids)
    .fetch_all(pool)
    .await?;

    let mut selections: HashMap<i64, Vec<Selection>> = HashMap::new();
    for row in selection_rows {
        selections
            .entry(row.reservation_id)
            .or_default()
            .push(Selection {
                food_item_id: row.food_item_id,
                food_item_name: row.food_item_name,
                unit_price: row.unit_price,
                quantity: row.quantity,
            });
    }

    let mut reservations: HashMap<i64, Vec<Reservation>> = HashMap::new();
    for row in reservation_rows {
        reservations
            .entry(row.order_id)
            .or_default()
            .push(Reservation {
                id: row.id,
                order_id: row.order_id,
                weekday: weekday(row.weekday)?,
                paid: row.paid,
                selections: selections.remove(&row.id).unwrap_or_default(),
            });
    }

    Ok(rows
        .into_iter()
        .map(|row| Order {
            reservations: reservations.remove(&row.id).unwrap_or_default(),
            id: row.id,
            profile_id: row.profile_id,
            form_id: row.form_id,
            name: row.name,
            grade: row.grade,
            total: row.total,
            paid: row.paid,
            created_at: row.created_at,
        })
        .collect())
}

pub async fn create(pool: &PgPool, data: &NewOrder) -> RepoResult<Order> {
    let mut tx = pool.begin().await?;

    // Unique (profile_id, form_id) turns a second submission into Duplicate
    let (order_id,): (i64,) = sqlx::query_as(
        "INSERT INTO orders (profile_id, form_id, name, grade, total, paid, created_at)
         VALUES ($1, $2, $3, $4, $5, FALSE, $6)
         RETURNING id",
    )
    .bind(data.profile_id)
    .bind(data.form_id)
    .bind(&data.name)
    .bind(&data.grade)
    .bind(data.total)
    .bind(data.created_at)
    .fetch_one(&mut *tx)
    .await?;

    for reservation in &data.reservations {
        let (reservation_id,): (i64,) = sqlx::query_as(
            "INSERT INTO reservations (order_id, weekday, paid)
             VALUES ($1, $2, FALSE) RETURNING id",
        )
        .bind(order_id)
        .bind(reservation.weekday.as_db())
        .fetch_one(&mut *tx)
        .await?;

        for selection in &reservation.selections {
            sqlx::query(
                "INSERT INTO selections
                    (reservation_id, food_item_id, food_item_name, unit_price, quantity)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(reservation_id)
            .bind(selection.food_item_id)
            .bind(&selection.food_item_name)
            .bind(selection.unit_price)
            .bind(selection.quantity)
            .execute(&mut *tx)
            .await?;
        }
    }

    let result = sqlx::query("UPDATE profiles SET coins = coins + $2 WHERE id = $1")
        .bind(data.profile_id)
        .bind(data.coins_awarded)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("profile {}", data.profile_id)));
    }

    tx.commit().await?;
    find(pool, order_id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("order {order_id}")))
}

pub async fn find(pool: &PgPool, id: i64) -> RepoResult<Option<Order>> {
    let row: Option<OrderRow> =
        sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(load(pool, vec![row]).await?.pop())
}

pub async fn find_by_reservation(pool: &PgPool, reservation_id: i64) -> RepoResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o
         JOIN reservations r ON r.order_id = o.id
         WHERE r.id = $1"
    ))
    .bind(reservation_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(load(pool, vec![row]).await?.pop())
}

pub async fn find_many(pool: &PgPool, ids: &[i64]) -> RepoResult<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ANY($1) ORDER BY o.id"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;
    load(pool, rows).await
}

pub async fn list_for_profile(pool: &PgPool, profile_id: i64) -> RepoResult<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o
         WHERE o.profile_id = $1
         ORDER BY o.created_at DESC, o.id DESC"
    ))
    .bind(profile_id)
    .fetch_all(pool)
    .await?;
    load(pool, rows).await
}

pub async fn exists_for_form(pool: &PgPool, profile_id: i64, form_id: i64) -> RepoResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM orders WHERE profile_id = $1 AND form_id = $2)",
    )
    .bind(profile_id)
    .bind(form_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn list(pool: &PgPool, query: &OrderQuery) -> RepoResult<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders o
         JOIN forms f ON f.id = o.form_id
         WHERE ($1::BIGINT IS NULL OR o.form_id = $1)
           AND ($2::TEXT IS NULL OR f.week = $2)
           AND ($3::BOOLEAN IS NULL OR o.paid = $3)
           AND ($4::BIGINT IS NULL OR o.created_at >= $4)
           AND ($5::BIGINT IS NULL OR o.created_at < $5)
         ORDER BY o.created_at DESC, o.id DESC"
    ))
    .bind(query.form_id)
    .bind(query.week.as_deref().map(str::trim))
    .bind(query.paid)
    .bind(query.created_from)
    .bind(query.created_to)
    .fetch_all(pool)
    .await?;
    load(pool, rows).await
}

pub async fn delete_unpaid(pool: &PgPool, id: i64) -> RepoResult<()> {
    let result = sqlx::query(
        "DELETE FROM orders o
         WHERE o.id = $1
           AND NOT o.paid
           AND NOT EXISTS (SELECT 1 FROM reservations r WHERE r.order_id = o.id AND r.paid)
           AND NOT EXISTS (SELECT 1 FROM checkout_sessions s WHERE s.order_id = o.id)",
    )
    .bind(id)
    .execute(pool)
    .await;
    match result {
        Ok(done) if done.rows_affected() > 0 => return Ok(()),
        Ok(_) => {}
        // A checkout session committed after the EXISTS check
        Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
            return Err(RepoError::Conflict(format!("order {id} has a checkout session")));
        }
        Err(e) => return Err(e.into()),
    }

    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if exists {
        Err(RepoError::Conflict(format!(
            "order {id} has a payment or a checkout session"
        )))
    } else {
        Err(RepoError::NotFound(format!("order {id}")))
    }
}

pub async fn mark_paid(pool: &PgPool, ids: &[i64]) -> RepoResult<u64> {
    let mut tx = pool.begin().await?;

    let flipped: Vec<(i64,)> = sqlx::query_as(
        "UPDATE orders SET paid = TRUE WHERE id = ANY($1) AND paid = FALSE RETURNING id",
    )
    .bind(ids)
    .fetch_all(&mut *tx)
    .await?;
    let flipped: Vec<i64> = flipped.into_iter().map(|(id,)| id).collect();

    sqlx::query("UPDATE reservations SET paid = TRUE WHERE order_id = ANY($1) AND paid = FALSE")
        .bind(&flipped)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(flipped.len() as u64)
}

pub async fn mark_reservation_paid(
    pool: &PgPool,
    reservation_id: i64,
) -> RepoResult<ReservationPaid> {
    let mut tx = pool.begin().await?;

    let flipped: Option<(i64,)> = sqlx::query_as(
        "UPDATE reservations SET paid = TRUE
         WHERE id = $1 AND paid = FALSE
         RETURNING order_id",
    )
    .bind(reservation_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (order_id, changed) = match flipped {
        Some((order_id,)) => (order_id, true),
        None => {
            let existing: Option<(i64,)> =
                sqlx::query_as("SELECT order_id FROM reservations WHERE id = $1")
                    .bind(reservation_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let (order_id,) = existing
                .ok_or_else(|| RepoError::NotFound(format!("reservation {reservation_id}")))?;
            (order_id, false)
        }
    };

    sqlx::query(
        "UPDATE orders SET paid = TRUE
         WHERE id = $1 AND paid = FALSE
           AND NOT EXISTS (SELECT 1 FROM reservations WHERE order_id = $1 AND paid = FALSE)",
    )
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    let (order_paid,): (bool,) = sqlx::query_as("SELECT paid FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(ReservationPaid {
        changed,
        order_paid,
    })
}
