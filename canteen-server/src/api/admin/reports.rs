//! Reports over a creation-time range `[from, to)` (Unix millis)

use axum::extract::{Query, State};
use serde::Deserialize;
use shared::error::ApiResponse;
use shared::models::{KitchenSheet, QuantityReport, ReportFilter};

use crate::api::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: i64,
    pub to: i64,
    #[serde(default)]
    pub paid_only: bool,
}

impl RangeQuery {
    fn filter(&self) -> ReportFilter {
        ReportFilter::from_paid_only(self.paid_only)
    }
}

pub async fn quantities(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<QuantityReport> {
    Ok(ApiResponse::success(
        state
            .reports
            .range_quantities(query.from, query.to, query.filter())
            .await?,
    ))
}

pub async fn kitchen_sheet(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<KitchenSheet> {
    Ok(ApiResponse::success(
        state
            .reports
            .range_kitchen_sheet(query.from, query.to, query.filter())
            .await?,
    ))
}
