use crate::{DbError, DbPool};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub profile_pic: Option<String>,
}

pub async fn create_user(
    pool: &DbPool,
    id: i64,
    email: &str,
    firstname: &str,
    lastname: &str,
    profile_pic: Option<&str>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (id, email, firstname, lastname, profile_pic)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, email, firstname, lastname, profile_pic",
    )
    .bind(id)
    .bind(email)
    .bind(firstname)
    .bind(lastname)
    .bind(profile_pic)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn find_user_by_id(pool: &DbPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, firstname, lastname, profile_pic FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
