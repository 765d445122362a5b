use crate::auth::SessionIdentity;
use crate::error::CoreError;
use crate::message::build_message;
use crate::receipts::ReadContext;
use crate::{membership, AppState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use cohort_db::attachments::AttachmentRow;
use cohort_db::DbPool;
use cohort_models::message::MessagePage;
use cohort_util::pagination::HistoryParams;

/// Page through a group's history as seen by `identity`.
pub async fn fetch_history(
    state: &AppState,
    identity: &SessionIdentity,
    group_id: i64,
    params: &HistoryParams,
) -> Result<MessagePage, CoreError> {
    membership::ensure_member(&state.db, group_id, identity.profile_id).await?;
    let limit = params.limit_within(
        state.config.history_default_limit,
        state.config.history_max_limit,
    );
    load_page(&state.db, identity.user_id, group_id, params.before, limit).await
}

/// Up to `limit` messages older than `before`, oldest first, each enriched
/// with read state for `viewer_id`. Callers must have authorized the viewer.
pub async fn load_page(
    pool: &DbPool,
    viewer_id: i64,
    group_id: i64,
    before: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<MessagePage, CoreError> {
    let mut rows = cohort_db::messages::list_messages(pool, group_id, before, limit).await?;
    rows.reverse();

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let reads = ReadContext::load(pool, group_id, &ids).await?;
    let mut attachments_by_message: HashMap<i64, Vec<AttachmentRow>> = HashMap::new();
    for attachment in cohort_db::attachments::list_attachments_for_messages(pool, &ids).await? {
        attachments_by_message
            .entry(attachment.message_id)
            .or_default()
            .push(attachment);
    }

    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let attachments = attachments_by_message.remove(&row.id).unwrap_or_default();
        let read_state = reads.state_for(row.id, row.sender_id, viewer_id);
        let mut message = build_message(row, attachments)?;
        message.read_state = Some(read_state);
        messages.push(message);
    }

    let next_cursor = messages.first().map(|m| m.created_at);
    Ok(MessagePage {
        messages,
        next_cursor,
    })
}
