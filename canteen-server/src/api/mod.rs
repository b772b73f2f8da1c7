//! HTTP API for canteen-server

mod admin;
mod auth;
mod checkout;
mod health;
mod orders;
mod paymongo_webhook;

#[cfg(test)]
mod tests;

use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::error::{ApiResponse, AppError};
use tower_http::trace::TraceLayer;

use crate::auth::rate_limit::sign_in_rate_limit;
use crate::auth::session::{require_admin, session_auth_middleware};
use crate::state::AppState;

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Sign-in (rate limited)
    let sign_in = Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            sign_in_rate_limit,
        ));

    // PayMongo webhook (signature-verified, raw body)
    let webhook = Router::new().route(
        "/paymongo/webhook",
        post(paymongo_webhook::handle_webhook),
    );

    let admin = admin::router().layer(middleware::from_fn(require_admin));

    // Session-authenticated API; admin routes additionally need the admin flag
    let api = Router::new()
        .route("/api/me", get(orders::me))
        .route("/api/menu", get(orders::menu))
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::submit_order),
        )
        .route(
            "/api/orders/{id}",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/api/orders/{id}/checkout", post(checkout::checkout_order))
        .route(
            "/api/reservations/{id}/checkout",
            post(checkout::checkout_reservation),
        )
        .merge(admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(sign_in)
        .merge(webhook)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
