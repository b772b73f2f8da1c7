//! Session JWT issued after sign-in

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::Profile;

use crate::state::AppState;

/// JWT claims for a signed-in profile
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Profile ID
    pub sub: String,
    pub email: String,
    /// Admin flag at issue time; guards re-read it from the profile
    pub admin: bool,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Profile of the caller, loaded fresh for every request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub profile: Profile,
}

const JWT_EXPIRY_HOURS: i64 = 24;

pub fn create_token(
    profile: &Profile,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = SessionClaims {
        sub: profile.id.to_string(),
        email: profile.email.clone(),
        admin: profile.is_admin,
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

fn decode_token(token: &str, secret: &str) -> Result<SessionClaims, AppError> {
    jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::new(ErrorCode::TokenExpired),
            _ => AppError::new(ErrorCode::TokenInvalid),
        }
    })
}

/// Verify `Authorization: Bearer` and inject [`CurrentUser`]
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::not_authenticated().into_response())?;

    let claims = decode_token(token, &state.jwt_secret).map_err(IntoResponse::into_response)?;
    let profile_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| AppError::new(ErrorCode::TokenInvalid).into_response())?;

    let profile = state
        .store
        .find_profile(profile_id)
        .await
        .map_err(|e| {
            tracing::error!(profile_id, "Failed to load session profile: {e}");
            AppError::new(ErrorCode::DatabaseError).into_response()
        })?
        .ok_or_else(|| AppError::not_authenticated().into_response())?;

    request.extensions_mut().insert(CurrentUser { profile });

    Ok(next.run(request).await)
}

/// Must run after [`session_auth_middleware`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, Response> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| AppError::not_authenticated().into_response())?;

    if !user.profile.is_admin {
        tracing::warn!(
            profile_id = user.profile.id,
            path = %request.uri().path(),
            "Admin route refused"
        );
        return Err(AppError::new(ErrorCode::AdminRequired).into_response());
    }

    Ok(next.run(request).await)
}
