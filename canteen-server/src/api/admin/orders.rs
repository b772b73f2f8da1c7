//! Order listing, detail and bulk actions

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::models::{AdminAction, AdminActionOutcome, Order, OrderQuery};

use crate::api::ApiResult;
use crate::error::ServiceError;
use crate::state::AppState;

/// GET /api/admin/orders?form_id=&week=&paid=
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Vec<Order>> {
    let orders = state
        .store
        .list_orders(&query)
        .await
        .map_err(ServiceError::from)?;
    Ok(ApiResponse::success(orders))
}

pub async fn detail(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Order> {
    state
        .store
        .find_order(id)
        .await
        .map_err(ServiceError::from)?
        .map(ApiResponse::success)
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))
}

/// POST /api/admin/orders/actions
pub async fn run_action(
    State(state): State<AppState>,
    Json(action): Json<AdminAction>,
) -> ApiResult<AdminActionOutcome> {
    Ok(ApiResponse::success(state.reports.run_action(&action).await?))
}
