use crate::{datetime_to_db_text, DbError, DbPool};
use chrono::{DateTime, Utc};

/// Record that `user_id` read each of `message_ids`. Ids outside the group
/// and the reader's own messages are skipped. Repeated calls are no-ops.
///
/// Returns the number of receipts actually inserted.
pub async fn bulk_insert_reads(
    pool: &DbPool,
    group_id: i64,
    user_id: i64,
    message_ids: &[i64],
    read_at: DateTime<Utc>,
) -> Result<u64, DbError> {
    if message_ids.is_empty() {
        return Ok(0);
    }

    let read_at = datetime_to_db_text(read_at);
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for message_id in message_ids {
        let result = sqlx::query(
            "INSERT INTO message_reads (message_id, user_id, read_at)
             SELECT id, $2, $3 FROM messages
             WHERE id = $1 AND group_id = $4 AND sender_id <> $2
             ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(*message_id)
        .bind(user_id)
        .bind(&read_at)
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;

    tracing::debug!(group_id, user_id, requested = message_ids.len(), inserted, "read receipts stored");
    Ok(inserted)
}

/// `(message_id, user_id)` pairs for every receipt on the given messages,
/// fetched in one query.
pub async fn list_readers_for_messages(
    pool: &DbPool,
    message_ids: &[i64],
) -> Result<Vec<(i64, i64)>, DbError> {
    if message_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("${}", i)).collect();
    let sql = format!(
        "SELECT message_id, user_id FROM message_reads
         WHERE message_id IN ({})
         ORDER BY message_id, user_id",
        placeholders.join(", ")
    );
    let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
    for message_id in message_ids {
        query = query.bind(*message_id);
    }
    Ok(query.fetch_all(pool).await?)
}
