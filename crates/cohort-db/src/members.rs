use crate::{DbError, DbPool};

pub async fn add_member(pool: &DbPool, group_id: i64, profile_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO group_members (group_id, profile_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(group_id)
    .bind(profile_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_member(pool: &DbPool, group_id: i64, profile_id: i64) -> Result<(), DbError> {
    sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND profile_id = $2")
        .bind(group_id)
        .bind(profile_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn is_member(pool: &DbPool, group_id: i64, profile_id: i64) -> Result<bool, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM group_members WHERE group_id = $1 AND profile_id = $2",
    )
    .bind(group_id)
    .bind(profile_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// User ids (not profile ids) of everyone currently in the group.
pub async fn list_member_user_ids(pool: &DbPool, group_id: i64) -> Result<Vec<i64>, DbError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT p.user_id
         FROM group_members gm
         INNER JOIN profiles p ON p.id = gm.profile_id
         WHERE gm.group_id = $1
         ORDER BY p.user_id",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
