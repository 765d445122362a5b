use crate::attachments::{insert_attachment, AttachmentRow, NewAttachmentRow};
use crate::{datetime_from_db_text, datetime_to_db_text, DbError, DbPool};
use chrono::{DateTime, Utc};
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub group_id: i64,
    pub sender_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::any::AnyRow> for MessageRow {
    fn from_row(row: &'r sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
        let created_at_raw: String = row.try_get("created_at")?;
        Ok(Self {
            id: row.try_get("id")?,
            group_id: row.try_get("group_id")?,
            sender_id: row.try_get("sender_id")?,
            body: row.try_get("body")?,
            created_at: datetime_from_db_text(&created_at_raw)?,
        })
    }
}

/// A message joined with its sender's display fields.
#[derive(Debug, Clone)]
pub struct MessageWithSenderRow {
    pub id: i64,
    pub group_id: i64,
    pub sender_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub firstname: String,
    pub lastname: String,
    pub profile_pic: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::any::AnyRow> for MessageWithSenderRow {
    fn from_row(row: &'r sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
        let created_at_raw: String = row.try_get("created_at")?;
        Ok(Self {
            id: row.try_get("id")?,
            group_id: row.try_get("group_id")?,
            sender_id: row.try_get("sender_id")?,
            body: row.try_get("body")?,
            created_at: datetime_from_db_text(&created_at_raw)?,
            firstname: row.try_get("firstname")?,
            lastname: row.try_get("lastname")?,
            profile_pic: row.try_get("profile_pic")?,
        })
    }
}

const MESSAGE_WITH_SENDER_COLUMNS: &str =
    "m.id, m.group_id, m.sender_id, m.body, m.created_at, u.firstname, u.lastname, u.profile_pic";

/// Insert a message and all of its attachments in one transaction. Either
/// everything becomes visible or nothing does.
pub async fn create_message_with_attachments(
    pool: &DbPool,
    id: i64,
    group_id: i64,
    sender_id: i64,
    body: &str,
    created_at: DateTime<Utc>,
    attachments: &[NewAttachmentRow<'_>],
) -> Result<(MessageRow, Vec<AttachmentRow>), DbError> {
    let mut tx = pool.begin().await?;

    let message = sqlx::query_as::<_, MessageRow>(
        "INSERT INTO messages (id, group_id, sender_id, body, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, group_id, sender_id, body, created_at",
    )
    .bind(id)
    .bind(group_id)
    .bind(sender_id)
    .bind(body)
    .bind(datetime_to_db_text(created_at))
    .fetch_one(&mut *tx)
    .await?;

    let mut stored = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        // Dropping `tx` on error rolls the message back.
        stored.push(insert_attachment(&mut *tx, message.id, attachment).await?);
    }

    tx.commit().await?;
    Ok((message, stored))
}

pub async fn get_message_with_sender(
    pool: &DbPool,
    id: i64,
) -> Result<Option<MessageWithSenderRow>, DbError> {
    let sql = format!(
        "SELECT {MESSAGE_WITH_SENDER_COLUMNS}
         FROM messages m
         INNER JOIN users u ON u.id = m.sender_id
         WHERE m.id = $1"
    );
    let row = sqlx::query_as::<_, MessageWithSenderRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Up to `limit` messages of a group, newest first. With `before`, only
/// messages created strictly earlier are returned.
pub async fn list_messages(
    pool: &DbPool,
    group_id: i64,
    before: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<MessageWithSenderRow>, DbError> {
    let rows = match before {
        Some(before) => {
            let sql = format!(
                "SELECT {MESSAGE_WITH_SENDER_COLUMNS}
                 FROM messages m
                 INNER JOIN users u ON u.id = m.sender_id
                 WHERE m.group_id = $1 AND m.created_at < $2
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT $3"
            );
            sqlx::query_as::<_, MessageWithSenderRow>(&sql)
                .bind(group_id)
                .bind(datetime_to_db_text(before))
                .bind(limit)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!(
                "SELECT {MESSAGE_WITH_SENDER_COLUMNS}
                 FROM messages m
                 INNER JOIN users u ON u.id = m.sender_id
                 WHERE m.group_id = $1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT $2"
            );
            sqlx::query_as::<_, MessageWithSenderRow>(&sql)
                .bind(group_id)
                .bind(limit)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows)
}
