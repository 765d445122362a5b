use crate::auth::SessionIdentity;
use crate::error::CoreError;
use crate::{membership, AppState, SNOWFLAKE_WORKER_ID};
use cohort_db::attachments::{AttachmentRow, NewAttachmentRow};
use cohort_db::messages::MessageWithSenderRow;
use cohort_db::DbPool;
use cohort_models::attachment::{Attachment, AttachmentType, NewAttachment};
use cohort_models::gateway::EVENT_NEW_MESSAGE;
use cohort_models::message::{Message, MessageSender};
use cohort_util::{snowflake, validation};

pub const MISSING_FIELDS: &str = "GroupId or message is missing";

/// Validate, throttle, authorize, persist and fan out one chat message.
///
/// The returned message is the persisted row re-read with sender display
/// fields and attachments; the same value is broadcast to the room.
pub async fn send_message(
    state: &AppState,
    identity: &SessionIdentity,
    group_id: i64,
    body: Option<&str>,
    attachments: &[NewAttachment],
) -> Result<Message, CoreError> {
    let body = match body {
        Some(body) => body,
        None if !attachments.is_empty() => "",
        None => return Err(CoreError::Validation(MISSING_FIELDS.into())),
    };
    validation::validate_message_content(body, attachments.len(), state.config.max_message_length)
        .map_err(|e| match e {
            validation::ValidationError::Empty => CoreError::Validation(MISSING_FIELDS.into()),
            other => CoreError::Validation(other.to_string()),
        })?;
    let resolved = validation::validate_attachments(attachments, state.config.max_attachments)
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    if let Err(wait) = state.throttle.try_acquire(identity.user_id) {
        tracing::debug!(user_id = identity.user_id, group_id, "send throttled");
        return Err(CoreError::RateLimited {
            retry_after_ms: wait.as_millis() as u64,
        });
    }

    membership::ensure_member(&state.db, group_id, identity.profile_id).await?;

    let message_id = snowflake::generate(SNOWFLAKE_WORKER_ID);
    let attachment_rows: Vec<NewAttachmentRow<'_>> = resolved
        .iter()
        .map(|(url, kind)| NewAttachmentRow {
            id: snowflake::generate(SNOWFLAKE_WORKER_ID),
            url: url.as_str(),
            attachment_type: *kind,
        })
        .collect();

    cohort_db::messages::create_message_with_attachments(
        &state.db,
        message_id,
        group_id,
        identity.user_id,
        body,
        chrono::Utc::now(),
        &attachment_rows,
    )
    .await
    .map_err(|e| {
        tracing::error!(
            error = %e,
            user_id = identity.user_id,
            group_id,
            "failed to persist message"
        );
        CoreError::from(e)
    })?;

    let message = load_message(&state.db, message_id).await?;
    let payload = serde_json::to_value(&message).map_err(|e| CoreError::Internal(e.to_string()))?;
    state
        .event_bus
        .dispatch_to_room(EVENT_NEW_MESSAGE, payload, group_id);

    tracing::info!(
        message_id,
        user_id = identity.user_id,
        group_id,
        attachments = message.attachments.len(),
        "message sent"
    );
    Ok(message)
}

/// Read a persisted message back with sender and attachments, no read state.
pub async fn load_message(pool: &DbPool, message_id: i64) -> Result<Message, CoreError> {
    let row = cohort_db::messages::get_message_with_sender(pool, message_id)
        .await?
        .ok_or_else(|| CoreError::Internal(format!("message {message_id} missing after insert")))?;
    let attachments = cohort_db::attachments::get_message_attachments(pool, message_id).await?;
    build_message(row, attachments)
}

pub(crate) fn build_message(
    row: MessageWithSenderRow,
    attachments: Vec<AttachmentRow>,
) -> Result<Message, CoreError> {
    let attachments = attachments
        .into_iter()
        .map(|att| {
            let attachment_type = att
                .attachment_type
                .parse::<AttachmentType>()
                .map_err(|e| CoreError::Internal(e.to_string()))?;
            Ok(Attachment {
                id: att.id,
                url: att.url,
                attachment_type,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    Ok(Message {
        id: row.id,
        group_id: row.group_id,
        message: row.body,
        sender: MessageSender {
            id: row.sender_id,
            firstname: row.firstname,
            lastname: row.lastname,
            profilepic: row.profile_pic,
        },
        attachments,
        created_at: row.created_at,
        read_state: None,
    })
}
