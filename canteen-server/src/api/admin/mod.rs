//! Admin API: catalog, forms, reports, orders, profiles
//!
//! Mounted behind the session guard and `require_admin`.

mod food_items;
mod forms;
mod orders;
mod profiles;
mod reports;

use axum::Router;
use axum::routing::{get, post, put};
use serde::Deserialize;
use shared::models::ReportFilter;

use crate::state::AppState;

/// `?paid_only=` on report endpoints; defaults to every order
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub paid_only: bool,
}

impl FilterQuery {
    pub fn filter(&self) -> ReportFilter {
        ReportFilter::from_paid_only(self.paid_only)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/food-items",
            get(food_items::list).post(food_items::create),
        )
        .route(
            "/api/admin/food-items/{id}",
            put(food_items::update).delete(food_items::delete),
        )
        .route("/api/admin/forms", get(forms::list).post(forms::create))
        .route(
            "/api/admin/forms/{id}",
            get(forms::get).put(forms::update).delete(forms::delete),
        )
        .route("/api/admin/forms/{id}/activate", post(forms::activate))
        .route("/api/admin/forms/{id}/deactivate", post(forms::deactivate))
        .route("/api/admin/forms/{id}/quantities", get(forms::quantities))
        .route("/api/admin/forms/{id}/kitchen-sheet", get(forms::kitchen_sheet))
        .route("/api/admin/reports/quantities", get(reports::quantities))
        .route("/api/admin/reports/kitchen-sheet", get(reports::kitchen_sheet))
        .route("/api/admin/orders", get(orders::list))
        .route("/api/admin/orders/actions", post(orders::run_action))
        .route("/api/admin/orders/{id}", get(orders::detail))
        .route("/api/admin/profiles", get(profiles::list))
}
