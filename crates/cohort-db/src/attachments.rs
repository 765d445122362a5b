use crate::{DbError, DbPool};
use cohort_models::attachment::AttachmentType;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttachmentRow {
    pub id: i64,
    pub message_id: i64,
    pub url: String,
    pub attachment_type: String,
}

/// Attachment about to be written together with its parent message.
#[derive(Debug, Clone, Copy)]
pub struct NewAttachmentRow<'a> {
    pub id: i64,
    pub url: &'a str,
    pub attachment_type: AttachmentType,
}

pub(crate) async fn insert_attachment(
    conn: &mut sqlx::AnyConnection,
    message_id: i64,
    attachment: &NewAttachmentRow<'_>,
) -> Result<AttachmentRow, DbError> {
    let row = sqlx::query_as::<_, AttachmentRow>(
        "INSERT INTO attachments (id, message_id, url, attachment_type)
         VALUES ($1, $2, $3, $4)
         RETURNING id, message_id, url, attachment_type",
    )
    .bind(attachment.id)
    .bind(message_id)
    .bind(attachment.url)
    .bind(attachment.attachment_type.as_str())
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn get_message_attachments(
    pool: &DbPool,
    message_id: i64,
) -> Result<Vec<AttachmentRow>, DbError> {
    let rows = sqlx::query_as::<_, AttachmentRow>(
        "SELECT id, message_id, url, attachment_type
         FROM attachments WHERE message_id = $1 ORDER BY id",
    )
    .bind(message_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Attachments of every listed message in one query, grouped by message and
/// ordered by id within each.
pub async fn list_attachments_for_messages(
    pool: &DbPool,
    message_ids: &[i64],
) -> Result<Vec<AttachmentRow>, DbError> {
    if message_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("${}", i)).collect();
    let sql = format!(
        "SELECT id, message_id, url, attachment_type
         FROM attachments WHERE message_id IN ({})
         ORDER BY message_id, id",
        placeholders.join(", ")
    );
    let mut query = sqlx::query_as::<_, AttachmentRow>(&sql);
    for message_id in message_ids {
        query = query.bind(*message_id);
    }
    Ok(query.fetch_all(pool).await?)
}
