use crate::{DbError, DbPool};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub user_id: i64,
}

pub async fn create_profile(
    pool: &DbPool,
    id: i64,
    user_id: i64,
    subjects: &str,
) -> Result<ProfileRow, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        "INSERT INTO profiles (id, user_id, subjects) VALUES ($1, $2, $3)
         RETURNING id, user_id",
    )
    .bind(id)
    .bind(user_id)
    .bind(subjects)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find_profile_by_user_id(
    pool: &DbPool,
    user_id: i64,
) -> Result<Option<ProfileRow>, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        "SELECT id, user_id FROM profiles WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
