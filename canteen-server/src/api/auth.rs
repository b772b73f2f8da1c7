//! Organizational sign-in
//!
//! GET /login: redirect to the identity provider
//! GET /callback: exchange the code, return a session token

use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;
use shared::error::{ApiResponse, AppError};
use shared::models::LoginResponse;

use crate::auth::create_token;
use crate::error::ServiceError;
use crate::identity::AuthorizationError;
use crate::state::AppState;

use super::ApiResult;

pub async fn login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let url = state
        .identity
        .login_url()
        .map_err(|e| AppError::from(ServiceError::from(e)))?;
    Ok(Redirect::to(&url))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<LoginResponse> {
    let code = match (query.error, query.code) {
        (Some(error), _) => {
            let reason = query.error_description.unwrap_or(error);
            tracing::warn!(reason = %reason, "Identity provider denied sign-in");
            return Err(ServiceError::from(AuthorizationError::Denied(reason)).into());
        }
        (None, Some(code)) if !code.trim().is_empty() => code,
        (None, _) => {
            return Err(
                ServiceError::from(AuthorizationError::Denied("missing code".into())).into(),
            );
        }
    };

    let profile = state.identity.authenticate(&code).await.map_err(|e| {
        tracing::warn!(error = %e, "Sign-in failed");
        AppError::from(ServiceError::from(e))
    })?;

    let token = create_token(&profile, &state.jwt_secret).map_err(|e| {
        tracing::error!("JWT creation failed: {e}");
        AppError::internal("Failed to create session")
    })?;

    Ok(ApiResponse::success(LoginResponse { token, profile }))
}
