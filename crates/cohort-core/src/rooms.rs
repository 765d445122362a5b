use crate::auth::SessionIdentity;
use crate::error::CoreError;
use crate::presence::PresenceTracker;
use crate::{history, membership, AppState};
use cohort_models::gateway::{UserTyping, EVENT_USER_TYPING};
use cohort_models::message::MessagePage;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

struct ConnectionRooms {
    user_id: i64,
    groups: HashSet<i64>,
}

/// Room multiplexer: which connection is subscribed to which group room.
///
/// Kept as two indexes, connection -> rooms and room -> connections. Lock
/// order is always `connections` before `rooms`, and presence is updated
/// while the connection entry is held so a concurrent disconnect can never
/// slip between a subscription and its presence mark.
pub struct RoomRegistry {
    connections: DashMap<Uuid, ConnectionRooms>,
    rooms: DashMap<i64, HashSet<Uuid>>,
    presence: Arc<PresenceTracker>,
}

impl RoomRegistry {
    pub fn new(presence: Arc<PresenceTracker>) -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            presence,
        }
    }

    /// Track a freshly authenticated connection with no rooms.
    pub fn register(&self, connection_id: Uuid, user_id: i64) {
        self.connections.insert(
            connection_id,
            ConnectionRooms {
                user_id,
                groups: HashSet::new(),
            },
        );
    }

    /// Subscribe a connection to a room and mark its user present. Returns
    /// `false` when the connection is already gone.
    pub fn join(&self, connection_id: Uuid, group_id: i64) -> bool {
        let Some(mut conn) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        conn.groups.insert(group_id);
        self.rooms.entry(group_id).or_default().insert(connection_id);
        self.presence.mark_present(group_id, conn.user_id, connection_id);
        true
    }

    /// Unsubscribe a connection from a room. Leaving a room one never joined
    /// is a no-op. Returns whether the connection was subscribed.
    pub fn leave(&self, connection_id: Uuid, group_id: i64) -> bool {
        let Some(mut conn) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        if !conn.groups.remove(&group_id) {
            return false;
        }
        self.remove_from_room(group_id, connection_id);
        self.presence.mark_absent(group_id, conn.user_id, connection_id);
        true
    }

    pub fn is_subscribed(&self, connection_id: Uuid, group_id: i64) -> bool {
        self.connections
            .get(&connection_id)
            .is_some_and(|conn| conn.groups.contains(&group_id))
    }

    /// Connections currently subscribed to a room.
    #[cfg(test)]
    pub fn subscribers(&self, group_id: i64) -> Vec<Uuid> {
        self.rooms
            .get(&group_id)
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn rooms_of(&self, connection_id: Uuid) -> Vec<i64> {
        let mut groups: Vec<i64> = self
            .connections
            .get(&connection_id)
            .map(|conn| conn.groups.iter().copied().collect())
            .unwrap_or_default();
        groups.sort_unstable();
        groups
    }

    /// Forget a connection entirely: leave every room it joined and mark it
    /// absent in each. Safe to call more than once. Returns the rooms left.
    pub fn disconnect(&self, connection_id: Uuid) -> Vec<i64> {
        let Some((_, conn)) = self.connections.remove(&connection_id) else {
            return Vec::new();
        };
        let mut groups: Vec<i64> = conn.groups.into_iter().collect();
        groups.sort_unstable();
        for group_id in &groups {
            self.remove_from_room(*group_id, connection_id);
            self.presence.mark_absent(*group_id, conn.user_id, connection_id);
        }
        groups
    }

    #[cfg(test)]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn remove_from_room(&self, group_id: i64, connection_id: Uuid) {
        if let Some(mut conns) = self.rooms.get_mut(&group_id) {
            conns.remove(&connection_id);
        }
        self.rooms.remove_if(&group_id, |_, conns| conns.is_empty());
    }
}

/// Authorize and subscribe a connection to a group room. On success returns
/// the join-time history page, or `None` when join history is disabled.
/// Nothing is subscribed or broadcast unless every step succeeds.
pub async fn join_group(
    state: &AppState,
    identity: &SessionIdentity,
    connection_id: Uuid,
    group_id: i64,
) -> Result<Option<MessagePage>, CoreError> {
    membership::ensure_member(&state.db, group_id, identity.profile_id).await?;

    let page = if state.config.join_history_limit > 0 {
        Some(
            history::load_page(
                &state.db,
                identity.user_id,
                group_id,
                None,
                state.config.join_history_limit,
            )
            .await?,
        )
    } else {
        None
    };

    if !state.rooms.join(connection_id, group_id) {
        return Err(CoreError::Internal("connection is closed".into()));
    }
    tracing::info!(user_id = identity.user_id, group_id, %connection_id, "joined group room");
    Ok(page)
}

pub fn leave_group(state: &AppState, identity: &SessionIdentity, connection_id: Uuid, group_id: i64) {
    let was_subscribed = state.rooms.leave(connection_id, group_id);
    tracing::info!(user_id = identity.user_id, group_id, %connection_id, was_subscribed, "left group room");
}

/// Relay a typing notice to the rest of the room. Dropped unless the
/// connection is subscribed to that room.
pub fn send_typing(
    state: &AppState,
    identity: &SessionIdentity,
    connection_id: Uuid,
    group_id: i64,
) -> bool {
    if !state.rooms.is_subscribed(connection_id, group_id) {
        return false;
    }
    let payload = match serde_json::to_value(UserTyping {
        user_id: identity.user_id,
        fullname: identity.full_name(),
    }) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode typing notice");
            return false;
        }
    };
    state
        .event_bus
        .dispatch_to_room_except(EVENT_USER_TYPING, payload, group_id, connection_id);
    true
}
