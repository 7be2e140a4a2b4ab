use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::access::AccessError;
use crate::user_storage::UserStorageError;

/// Error type returned by HTTP handlers.
///
/// Wraps [`AccessError`] for record operations and adds the account errors.
/// Every variant renders as `{"error": .., "code": ..}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("{0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<UserStorageError> for AppError {
    fn from(err: UserStorageError) -> Self {
        match err {
            UserStorageError::UsernameTaken => AppError::UsernameTaken,
            UserStorageError::Storage(e) => AppError::Access(AccessError::Storage(e)),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Access(AccessError::Storage(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Access(access) => match access {
                AccessError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
                AccessError::NotFoundOrUnauthorized { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                AccessError::Validation(errors) => {
                    let body = json!({
                        "error": "Validation failed",
                        "code": "VALIDATION_ERROR",
                        "fields": errors,
                    });
                    return (StatusCode::BAD_REQUEST, Json(body)).into_response();
                }
                AccessError::Storage(err) => {
                    tracing::error!(error = ?err, "storage failure");
                    let body = json!({
                        "error": "An internal error occurred",
                        "code": "INTERNAL_ERROR",
                    });
                    return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
                }
            },
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AppError::UsernameTaken => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        };

        let body = json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
