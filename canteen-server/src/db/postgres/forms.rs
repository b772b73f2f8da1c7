//! Weekly form storage
//!
//! A form owns its options: they are rewritten as a whole on replace and
//! removed by cascade with the form.

use std::collections::HashMap;

use shared::models::{FoodCategory, Form, FormSummary, FormUpsert, MenuOption, display_week};
use sqlx::{PgPool, Postgres, Transaction};

use super::{category, weekday};
use crate::db::{RepoError, RepoResult};

#[derive(sqlx::FromRow)]
struct FormRow {
    id: i64,
    category: String,
    week: String,
    active: bool,
    created_at: i64,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: i64,
    form_id: i64,
    weekday: i16,
}

#[derive(sqlx::FromRow)]
struct OptionItemRow {
    option_id: i64,
    food_item_id: i64,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    category: String,
    week: String,
    active: bool,
    created_at: i64,
    total_orders: i64,
}

/// Attach options to form rows
async fn load(pool: &PgPool, rows: Vec<FormRow>) -> RepoResult<Vec<Form>> {
    let form_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let option_rows: Vec<OptionRow> = sqlx::query_as(
        "SELECT id, form_id, weekday FROM menu_options
         WHERE form_id = ANY($1) ORDER BY form_id, weekday",
    )
    .bind(&form_ids)
    .fetch_all(pool)
    .await?;

    let option_ids: Vec<i64> = option_rows.iter().map(|r| r.id).collect();
    let item_rows: Vec<OptionItemRow> = sqlx::query_as(
        "SELECT option_id, food_item_id FROM menu_option_items
         WHERE option_id = ANY($1) ORDER BY option_id, food_item_id",
    )
    .bind(&option_ids)
    .fetch_all(pool)
    .await?;

    let mut items_by_option: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in item_rows {
        items_by_option
            .entry(row.option_id)
            .or_default()
            .push(row.food_item_id);
    }

    let mut options_by_form: HashMap<i64, Vec<MenuOption>> = HashMap::new();
    for row in option_rows {
        options_by_form
            .entry(row.form_id)
            .or_default()
            .push(MenuOption {
                weekday: weekday(row.weekday)?,
                food_item_ids: items_by_option.remove(&row.id).unwrap_or_default(),
            });
    }

    rows.into_iter()
        .map(|row| -> RepoResult<Form> {
            Ok(Form {
                id: row.id,
                category: category(&row.category)?,
                week: row.week,
                active: row.active,
                created_at: row.created_at,
                options: options_by_form.remove(&row.id).unwrap_or_default(),
            })
        })
        .collect()
}

pub async fn list(pool: &PgPool) -> RepoResult<Vec<FormSummary>> {
    let rows: Vec<SummaryRow> = sqlx::query_as(
        "SELECT f.id, f.category, f.week, f.active, f.created_at,
                COUNT(o.id) AS total_orders
         FROM forms f
         LEFT JOIN orders o ON o.form_id = f.id
         GROUP BY f.id
         ORDER BY f.created_at DESC, f.id DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| -> RepoResult<FormSummary> {
            Ok(FormSummary {
                id: row.id,
                category: category(&row.category)?,
                week_period: display_week(&row.week),
                week: row.week,
                active: row.active,
                created_at: row.created_at,
                total_orders: row.total_orders,
            })
        })
        .collect()
}

pub async fn find(pool: &PgPool, id: i64) -> RepoResult<Option<Form>> {
    let row: Option<FormRow> =
        sqlx::query_as("SELECT id, category, week, active, created_at FROM forms WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(load(pool, vec![row]).await?.pop())
}

pub async fn find_active(pool: &PgPool, category: FoodCategory) -> RepoResult<Option<Form>> {
    let row: Option<FormRow> = sqlx::query_as(
        "SELECT id, category, week, active, created_at FROM forms
         WHERE category = $1 AND active",
    )
    .bind(category.as_db())
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(load(pool, vec![row]).await?.pop())
}

async fn deactivate_others(
    tx: &mut Transaction<'_, Postgres>,
    category: FoodCategory,
    keep: i64,
) -> RepoResult<()> {
    sqlx::query("UPDATE forms SET active = FALSE WHERE category = $1 AND id <> $2 AND active")
        .bind(category.as_db())
        .bind(keep)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_options(
    tx: &mut Transaction<'_, Postgres>,
    form_id: i64,
    options: &[MenuOption],
) -> RepoResult<()> {
    for option in options {
        let (option_id,): (i64,) = sqlx::query_as(
            "INSERT INTO menu_options (form_id, weekday) VALUES ($1, $2) RETURNING id",
        )
        .bind(form_id)
        .bind(option.weekday.as_db())
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO menu_option_items (option_id, food_item_id)
             SELECT $1, UNNEST($2::BIGINT[])
             ON CONFLICT DO NOTHING",
        )
        .bind(option_id)
        .bind(&option.food_item_ids)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn create(pool: &PgPool, data: &FormUpsert, now: i64) -> RepoResult<Form> {
    let mut tx = pool.begin().await?;

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO forms (category, week, active, created_at)
         VALUES ($1, $2, FALSE, $3) RETURNING id",
    )
    .bind(data.category.as_db())
    .bind(data.week.trim())
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    if data.active {
        deactivate_others(&mut tx, data.category, id).await?;
        sqlx::query("UPDATE forms SET active = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    insert_options(&mut tx, id, &data.options).await?;

    tx.commit().await?;
    find(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("form {id}")))
}

/// With orders present only the active flag may change
pub async fn replace(pool: &PgPool, id: i64, data: &FormUpsert) -> RepoResult<Form> {
    let mut tx = pool.begin().await?;

    // Row lock also holds off order inserts (their foreign key shares it)
    let locked: Option<(i64,)> = sqlx::query_as("SELECT id FROM forms WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if locked.is_none() {
        return Err(RepoError::NotFound(format!("form {id}")));
    }
    let (has_orders,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE form_id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    if has_orders {
        let current = find(pool, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("form {id}")))?;
        if !current.same_menu(data) {
            return Err(RepoError::Conflict(format!("form {id} has orders")));
        }
    }

    if data.active {
        deactivate_others(&mut tx, data.category, id).await?;
    }
    let result = sqlx::query("UPDATE forms SET category = $2, week = $3, active = $4 WHERE id = $1")
        .bind(id)
        .bind(data.category.as_db())
        .bind(data.week.trim())
        .bind(data.active)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("form {id}")));
    }

    sqlx::query("DELETE FROM menu_options WHERE form_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_options(&mut tx, id, &data.options).await?;

    tx.commit().await?;
    find(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("form {id}")))
}

pub async fn set_active(pool: &PgPool, id: i64, active: bool) -> RepoResult<Form> {
    let mut tx = pool.begin().await?;

    let row: Option<(String,)> = sqlx::query_as("SELECT category FROM forms WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some((raw_category,)) = row else {
        return Err(RepoError::NotFound(format!("form {id}")));
    };

    if active {
        deactivate_others(&mut tx, category(&raw_category)?, id).await?;
    }
    sqlx::query("UPDATE forms SET active = $2 WHERE id = $1")
        .bind(id)
        .bind(active)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    find(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("form {id}")))
}

pub async fn delete(pool: &PgPool, id: i64) -> RepoResult<()> {
    let mut tx = pool.begin().await?;

    let (has_orders,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE form_id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    if has_orders {
        return Err(RepoError::Conflict(format!("form {id} has orders")));
    }

    let result = sqlx::query("DELETE FROM forms WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("form {id}")));
    }

    tx.commit().await?;
    Ok(())
}
