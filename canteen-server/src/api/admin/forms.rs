//! Weekly forms: CRUD, activation and per-form reports

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::error::ApiResponse;
use shared::models::{Form, FormSummary, FormUpsert, KitchenSheet, QuantityReport};

use super::FilterQuery;
use crate::api::ApiResult;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<FormSummary>> {
    Ok(ApiResponse::success(state.catalog.list_forms().await?))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.catalog.get_form(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(data): Json<FormUpsert>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.catalog.create_form(&data).await?))
}

/// Replaces the form and all of its options
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(data): Json<FormUpsert>,
) -> ApiResult<Form> {
    Ok(ApiResponse::success(state.catalog.update_form(id, &data).await?))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.catalog.delete_form(id).await?;
    Ok(ApiResponse::ok())
}

pub async fn activate(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Form> {
    Ok(ApiResponse::success(
        state.catalog.set_form_active(id, true).await?,
    ))
}

pub async fn deactivate(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Form> {
    Ok(ApiResponse::success(
        state.catalog.set_form_active(id, false).await?,
    ))
}

pub async fn quantities(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<FilterQuery>,
) -> ApiResult<QuantityReport> {
    Ok(ApiResponse::success(
        state.reports.form_quantities(id, query.filter()).await?,
    ))
}

pub async fn kitchen_sheet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<FilterQuery>,
) -> ApiResult<KitchenSheet> {
    Ok(ApiResponse::success(
        state.reports.form_kitchen_sheet(id, query.filter()).await?,
    ))
}
