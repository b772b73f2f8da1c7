//! Hosted checkout for a whole order or a single day

use axum::{
    Extension,
    extract::{Path, State},
};
use shared::error::ApiResponse;
use shared::models::{CheckoutResponse, PaymentTarget};

use crate::auth::CurrentUser;
use crate::state::AppState;

use super::ApiResult;

/// POST /api/orders/{id}/checkout
pub async fn checkout_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(order_id): Path<i64>,
) -> ApiResult<CheckoutResponse> {
    let resp = state
        .payments
        .checkout(&user.profile, PaymentTarget::Order(order_id))
        .await?;
    Ok(ApiResponse::success(resp))
}

/// POST /api/reservations/{id}/checkout
pub async fn checkout_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(reservation_id): Path<i64>,
) -> ApiResult<CheckoutResponse> {
    let resp = state
        .payments
        .checkout(&user.profile, PaymentTarget::Reservation(reservation_id))
        .await?;
    Ok(ApiResponse::success(resp))
}
