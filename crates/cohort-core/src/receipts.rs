use crate::auth::SessionIdentity;
use crate::error::CoreError;
use crate::{membership, AppState};
use cohort_db::DbPool;
use cohort_models::gateway::{MessagesRead, EVENT_MESSAGES_READ};
use cohort_models::message::ReadState;
use std::collections::{HashMap, HashSet};

/// Record that the caller read `message_ids` in `group_id` and tell the room.
///
/// Ids from other groups and the caller's own messages are skipped; the
/// broadcast still echoes the ids as requested. Returns how many receipts
/// were new.
pub async fn mark_read(
    state: &AppState,
    identity: &SessionIdentity,
    group_id: i64,
    message_ids: &[i64],
) -> Result<u64, CoreError> {
    membership::ensure_member(&state.db, group_id, identity.profile_id).await?;

    let inserted = cohort_db::message_reads::bulk_insert_reads(
        &state.db,
        group_id,
        identity.user_id,
        message_ids,
        chrono::Utc::now(),
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id = identity.user_id, group_id, "failed to store read receipts");
        CoreError::from(e)
    })?;

    let payload = serde_json::to_value(MessagesRead {
        user_id: identity.user_id,
        message_ids: message_ids.to_vec(),
    })
    .map_err(|e| CoreError::Internal(e.to_string()))?;
    state
        .event_bus
        .dispatch_to_room(EVENT_MESSAGES_READ, payload, group_id);

    Ok(inserted)
}

/// Receipts and the live member roster needed to derive read state for a
/// batch of messages in one group.
#[derive(Debug, Default)]
pub struct ReadContext {
    members: HashSet<i64>,
    readers: HashMap<i64, HashSet<i64>>,
}

impl ReadContext {
    pub async fn load(pool: &DbPool, group_id: i64, message_ids: &[i64]) -> Result<Self, CoreError> {
        let members = cohort_db::members::list_member_user_ids(pool, group_id)
            .await?
            .into_iter()
            .collect();
        let mut readers: HashMap<i64, HashSet<i64>> = HashMap::new();
        for (message_id, user_id) in
            cohort_db::message_reads::list_readers_for_messages(pool, message_ids).await?
        {
            readers.entry(message_id).or_default().insert(user_id);
        }
        Ok(Self { members, readers })
    }

    pub fn state_for(&self, message_id: i64, sender_id: i64, viewer_id: i64) -> ReadState {
        let empty = HashSet::new();
        let readers = self.readers.get(&message_id).unwrap_or(&empty);
        compute_read_state(sender_id, viewer_id, &self.members, readers)
    }
}

/// Read state of one message for one viewer.
///
/// The sender has implicitly read their own message. `fully_read` is judged
/// against the current roster, so a message with no other members is fully
/// read.
pub fn compute_read_state(
    sender_id: i64,
    viewer_id: i64,
    members: &HashSet<i64>,
    readers: &HashSet<i64>,
) -> ReadState {
    let is_read = viewer_id == sender_id || readers.contains(&viewer_id);
    let fully_read = members
        .iter()
        .filter(|&&member| member != sender_id)
        .all(|member| readers.contains(member));
    let read_count = readers.iter().filter(|&&reader| reader != sender_id).count() as u32;
    ReadState {
        is_read,
        fully_read,
        read_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[i64]) -> HashSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn fully_read_needs_every_other_member() {
        let members = set(&[1, 2, 3]);

        let state = compute_read_state(1, 2, &members, &set(&[2]));
        assert!(state.is_read);
        assert!(!state.fully_read);
        assert_eq!(state.read_count, 1);

        let state = compute_read_state(1, 2, &members, &set(&[2, 3]));
        assert!(state.fully_read);
        assert_eq!(state.read_count, 2);
    }

    #[test]
    fn sender_has_always_read_their_own_message() {
        let state = compute_read_state(1, 1, &set(&[1, 2]), &HashSet::new());
        assert!(state.is_read);
        assert!(!state.fully_read);
        assert_eq!(state.read_count, 0);
    }

    #[test]
    fn lone_member_message_is_fully_read() {
        let state = compute_read_state(1, 1, &set(&[1]), &HashSet::new());
        assert!(state.fully_read);
    }

    #[test]
    fn departed_members_leave_the_denominator() {
        // Reader 4 is no longer a member but their receipt still counts.
        let state = compute_read_state(1, 2, &set(&[1, 2]), &set(&[2, 4]));
        assert!(state.fully_read);
        assert_eq!(state.read_count, 2);
    }
}
