//! Employee endpoints: own profile, active menus, own orders

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use shared::error::ApiResponse;
use shared::models::{ActiveMenu, Order, OrderSubmission, Profile};

use crate::auth::CurrentUser;
use crate::state::AppState;

use super::ApiResult;

/// GET /api/me
pub async fn me(Extension(user): Extension<CurrentUser>) -> ApiResult<Profile> {
    Ok(ApiResponse::success(user.profile))
}

/// GET /api/menu
pub async fn menu(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<ActiveMenu>> {
    Ok(ApiResponse::success(
        state.orders.active_menus(&user.profile).await?,
    ))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<Order>> {
    Ok(ApiResponse::success(state.orders.list_own(&user.profile).await?))
}

/// POST /api/orders
pub async fn submit_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(submission): Json<OrderSubmission>,
) -> ApiResult<Order> {
    let order = state.orders.submit(&user.profile, &submission).await?;
    Ok(ApiResponse::success(order))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(order_id): Path<i64>,
) -> ApiResult<Order> {
    Ok(ApiResponse::success(
        state.orders.find_own(&user.profile, order_id).await?,
    ))
}

/// DELETE /api/orders/{id}
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(order_id): Path<i64>,
) -> ApiResult<()> {
    state.orders.delete_own(&user.profile, order_id).await?;
    Ok(ApiResponse::ok())
}
