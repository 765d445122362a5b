use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use cohort_core::auth::{self, SessionIdentity};
use cohort_core::AppState;

use crate::error::ApiError;

/// Bearer-authenticated caller, resolved to user and profile.
pub struct AuthUser(pub SessionIdentity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let identity = auth::authenticate(&state.db, token, &state.config.jwt_secret).await?;
        Ok(AuthUser(identity))
    }
}
