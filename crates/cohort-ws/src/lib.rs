mod handler;
mod payload;
mod session;

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use cohort_core::auth::{self, AuthError};
use cohort_core::AppState;
use serde::Deserialize;
use serde_json::json;

pub fn gateway_router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

#[derive(Debug, Default, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// Authenticate before upgrading so a refused client never gets a socket.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
) -> Response {
    let token = query.token.or_else(|| bearer_token(&headers));
    match auth::authenticate(&state.db, token.as_deref(), &state.config.jwt_secret).await {
        Ok(identity) => ws
            .on_upgrade(move |socket| handler::handle_connection(socket, state, identity))
            .into_response(),
        Err(AuthError::Internal(reason)) => {
            tracing::error!(%reason, "gateway authentication failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "server error" })),
            )
                .into_response()
        }
        Err(err) => {
            tracing::debug!(reason = %err, "gateway connection refused");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": format!("auth-error: {err}") })),
            )
                .into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}
