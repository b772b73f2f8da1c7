//! PayMongo webhook handler
//!
//! POST /paymongo/webhook: raw body, verified against `Paymongo-Signature`

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use shared::error::AppError;

use crate::error::ServiceError;
use crate::payment::WebhookVerificationError;
use crate::state::AppState;

/// Must receive the raw body (not JSON) for HMAC verification.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get("paymongo-signature")
        .and_then(|v| v.to_str().ok());

    match state.payments.handle_webhook(signature, &body).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Webhook handled");
            StatusCode::OK
        }
        Err(e) => {
            if !matches!(e, WebhookVerificationError::Store(_)) {
                tracing::warn!(error = %e, "Webhook rejected");
            }
            AppError::from(ServiceError::from(e)).http_status()
        }
    }
}
