//! Food item storage

use shared::models::{FoodCategory, FoodItem, FoodItemCreate, FoodItemUpdate};
use sqlx::PgPool;

use super::category;
use crate::db::{RepoError, RepoResult};

#[derive(sqlx::FromRow)]
struct FoodItemRow {
    id: i64,
    name: String,
    price: i64,
    category: String,
    image: String,
}

impl FoodItemRow {
    fn into_model(self) -> RepoResult<FoodItem> {
        Ok(FoodItem {
            id: self.id,
            name: self.name,
            price: self.price,
            category: category(&self.category)?,
            image: self.image,
        })
    }
}

pub async fn list(pool: &PgPool, category: Option<FoodCategory>) -> RepoResult<Vec<FoodItem>> {
    let rows: Vec<FoodItemRow> = sqlx::query_as(
        "SELECT id, name, price, category, image FROM food_items
         WHERE ($1::TEXT IS NULL OR category = $1)
         ORDER BY name, id",
    )
    .bind(category.map(|c| c.as_db()))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(FoodItemRow::into_model).collect()
}

pub async fn find_many(pool: &PgPool, ids: &[i64]) -> RepoResult<Vec<FoodItem>> {
    let rows: Vec<FoodItemRow> = sqlx::query_as(
        "SELECT id, name, price, category, image FROM food_items WHERE id = ANY($1) ORDER BY id",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(FoodItemRow::into_model).collect()
}

pub async fn create(pool: &PgPool, data: &FoodItemCreate) -> RepoResult<FoodItem> {
    let row: FoodItemRow = sqlx::query_as(
        "INSERT INTO food_items (name, price, category, image)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, price, category, image",
    )
    .bind(&data.name)
    .bind(data.price)
    .bind(data.category.as_db())
    .bind(&data.image)
    .fetch_one(pool)
    .await?;
    row.into_model()
}

pub async fn update(pool: &PgPool, id: i64, data: &FoodItemUpdate) -> RepoResult<FoodItem> {
    let mut tx = pool.begin().await?;

    let current: Option<(String,)> =
        sqlx::query_as("SELECT category FROM food_items WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some((current,)) = current else {
        return Err(RepoError::NotFound(format!("food item {id}")));
    };

    // A menu item must keep the category of the forms offering it
    if let Some(next) = data.category
        && next.as_db() != current
    {
        let (on_menu,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM menu_option_items WHERE food_item_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if on_menu {
            return Err(RepoError::Conflict(format!("food item {id} is on a menu")));
        }
    }

    let row: FoodItemRow = sqlx::query_as(
        "UPDATE food_items SET
            name = COALESCE($2, name),
            price = COALESCE($3, price),
            category = COALESCE($4, category),
            image = COALESCE($5, image)
         WHERE id = $1
         RETURNING id, name, price, category, image",
    )
    .bind(id)
    .bind(data.name.as_deref())
    .bind(data.price)
    .bind(data.category.map(|c| c.as_db()))
    .bind(data.image.as_deref())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    row.into_model()
}

pub async fn delete(pool: &PgPool, id: i64) -> RepoResult<()> {
    let mut tx = pool.begin().await?;

    let (in_use,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM menu_option_items WHERE food_item_id = $1)
             OR EXISTS (SELECT 1 FROM selections WHERE food_item_id = $1)",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    if in_use {
        return Err(RepoError::Conflict(format!("food item {id} is referenced")));
    }

    let result = sqlx::query("DELETE FROM food_items WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("food item {id}")));
    }

    tx.commit().await?;
    Ok(())
}
