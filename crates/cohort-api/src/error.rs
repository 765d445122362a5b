use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cohort_core::auth::AuthError;
use cohort_core::error::CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("You're sending messages too fast!")]
    RateLimited,
    #[error("server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = self.to_string();
        (status, Json(json!({ "error": message, "message": message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Internal(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
            other => ApiError::Unauthorized(format!("auth-error: {other}")),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Unauthenticated(auth) => auth.into(),
            CoreError::NotMember => ApiError::Forbidden(CoreError::NotMember.client_message()),
            CoreError::Validation(msg) => ApiError::BadRequest(msg),
            CoreError::RateLimited { .. } => ApiError::RateLimited,
            CoreError::Database(err) => ApiError::Internal(anyhow::anyhow!("database error: {err}")),
            CoreError::Internal(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
        }
    }
}
