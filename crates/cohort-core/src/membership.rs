use crate::error::CoreError;
use cohort_db::DbPool;

/// Ask the store whether `profile_id` belongs to `group_id`. Never cached, so
/// membership changes are seen by the very next action.
pub async fn is_member(pool: &DbPool, group_id: i64, profile_id: i64) -> Result<bool, CoreError> {
    Ok(cohort_db::members::is_member(pool, group_id, profile_id).await?)
}

pub async fn ensure_member(pool: &DbPool, group_id: i64, profile_id: i64) -> Result<(), CoreError> {
    if is_member(pool, group_id, profile_id).await? {
        Ok(())
    } else {
        Err(CoreError::NotMember)
    }
}
