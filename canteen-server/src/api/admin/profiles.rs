use axum::extract::State;
use shared::error::ApiResponse;
use shared::models::ProfileSummary;

use crate::api::ApiResult;
use crate::error::ServiceError;
use crate::state::AppState;

/// GET /api/admin/profiles
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<ProfileSummary>> {
    let profiles = state
        .store
        .list_profiles()
        .await
        .map_err(ServiceError::from)?;
    Ok(ApiResponse::success(profiles))
}
