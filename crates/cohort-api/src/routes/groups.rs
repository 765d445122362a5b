use axum::{
    extract::{Path, Query, State},
    Json,
};
use cohort_core::{history, membership, AppState};
use cohort_models::message::MessagePage;
use cohort_util::pagination::HistoryParams;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;

pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(group_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<MessagePage>, ApiError> {
    let page = history::fetch_history(&state, &identity, group_id, &params).await?;
    Ok(Json(page))
}

/// Snapshot of the room roster, same shape as `group-online-users`.
pub async fn get_online_users(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(group_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    membership::ensure_member(&state.db, group_id, identity.profile_id).await?;
    let roster = state.presence.roster(group_id);
    Ok(Json(json!({
        "groupId": group_id.to_string(),
        "users": cohort_core::presence::roster_payload(&roster),
    })))
}
