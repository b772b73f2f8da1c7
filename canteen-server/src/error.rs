//! Unified service-layer error type
//!
//! `ServiceError` bridges store errors (`RepoError`) and the API-layer error
//! (`AppError`) so services can use `?` on both.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::db::RepoError;

/// Service-layer error
///
/// - `Repo`: store failures that were not mapped to a business error
///   (logged, surfaced as `DatabaseError` / generic codes)
/// - `App`: business-rule errors passed through to the client
#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    App(AppError),
}

impl From<RepoError> for ServiceError {
    fn from(e: RepoError) -> Self {
        ServiceError::Repo(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Repo(RepoError::NotFound(what)) => {
                AppError::with_message(ErrorCode::NotFound, format!("{what} not found"))
            }
            ServiceError::Repo(RepoError::Duplicate(what)) => {
                AppError::with_message(ErrorCode::AlreadyExists, format!("{what} already exists"))
            }
            ServiceError::Repo(RepoError::Conflict(what)) => {
                AppError::with_message(ErrorCode::InvalidRequest, what)
            }
            ServiceError::Repo(RepoError::Database(msg)) => {
                tracing::error!(error = %msg, "Service database error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_hides_detail() {
        let err: AppError = ServiceError::Repo(RepoError::Database("pool timed out".into())).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("pool"));
    }

    #[test]
    fn test_app_error_passes_through() {
        let err: AppError = ServiceError::App(AppError::new(ErrorCode::OrderEmpty)).into();
        assert_eq!(err.code, ErrorCode::OrderEmpty);
    }
}
