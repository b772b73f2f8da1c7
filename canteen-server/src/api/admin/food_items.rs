//! Food item CRUD

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::ApiResponse;
use shared::models::{FoodCategory, FoodItem, FoodItemCreate, FoodItemUpdate};

use crate::api::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub category: Option<FoodCategory>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<FoodItem>> {
    Ok(ApiResponse::success(
        state.catalog.list_food_items(query.category).await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Json(data): Json<FoodItemCreate>,
) -> ApiResult<FoodItem> {
    Ok(ApiResponse::success(state.catalog.create_food_item(&data).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(data): Json<FoodItemUpdate>,
) -> ApiResult<FoodItem> {
    Ok(ApiResponse::success(
        state.catalog.update_food_item(id, &data).await?,
    ))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.catalog.delete_food_item(id).await?;
    Ok(ApiResponse::ok())
}
