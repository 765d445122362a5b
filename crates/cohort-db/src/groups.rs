use crate::{DbError, DbPool};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub subject_focus: Option<String>,
    pub max_members: i64,
}

pub async fn create_group(
    pool: &DbPool,
    id: i64,
    name: &str,
    subject_focus: Option<&str>,
    max_members: i64,
) -> Result<GroupRow, DbError> {
    let row = sqlx::query_as::<_, GroupRow>(
        "INSERT INTO study_groups (id, name, subject_focus, max_members)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, subject_focus, max_members",
    )
    .bind(id)
    .bind(name)
    .bind(subject_focus)
    .bind(max_members)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
