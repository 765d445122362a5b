use crate::events::EventBus;
use cohort_models::gateway::EVENT_GROUP_ONLINE_USERS;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Process-wide presence: group -> user -> connections joined to the room.
///
/// A user counts as present while any of their connections is joined. Every
/// change publishes the complete roster, and the publish happens while the
/// group's entry is still locked so rosters for one group leave in the order
/// they were produced.
pub struct PresenceTracker {
    groups: DashMap<i64, HashMap<i64, HashSet<Uuid>>>,
    event_bus: EventBus,
}

impl PresenceTracker {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            groups: DashMap::new(),
            event_bus,
        }
    }

    /// Idempotent add. Returns the roster that was broadcast.
    pub fn mark_present(&self, group_id: i64, user_id: i64, connection_id: Uuid) -> Vec<i64> {
        let mut users = self.groups.entry(group_id).or_default();
        users.entry(user_id).or_default().insert(connection_id);
        let roster = sorted_roster(&users);
        self.broadcast(group_id, &roster);
        roster
    }

    /// Idempotent remove. The user stays listed if another of their
    /// connections is still in the room. A group nobody is present in is
    /// left untouched and nothing is broadcast.
    pub fn mark_absent(&self, group_id: i64, user_id: i64, connection_id: Uuid) -> Vec<i64> {
        let Some(mut users) = self.groups.get_mut(&group_id) else {
            return Vec::new();
        };
        if let Some(connections) = users.get_mut(&user_id) {
            connections.remove(&connection_id);
            if connections.is_empty() {
                users.remove(&user_id);
            }
        }
        let roster = sorted_roster(&users);
        self.broadcast(group_id, &roster);
        drop(users);
        self.groups.remove_if(&group_id, |_, users| users.is_empty());
        roster
    }

    /// Current roster of a group, sorted by user id.
    pub fn roster(&self, group_id: i64) -> Vec<i64> {
        self.groups
            .get(&group_id)
            .map(|users| sorted_roster(&users))
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn is_present(&self, group_id: i64, user_id: i64) -> bool {
        self.groups
            .get(&group_id)
            .is_some_and(|users| users.contains_key(&user_id))
    }

    #[cfg(test)]
    pub(crate) fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn broadcast(&self, group_id: i64, roster: &[i64]) {
        self.event_bus
            .dispatch_to_room(EVENT_GROUP_ONLINE_USERS, roster_payload(roster), group_id);
    }
}

fn sorted_roster(users: &HashMap<i64, HashSet<Uuid>>) -> Vec<i64> {
    let mut roster: Vec<i64> = users.keys().copied().collect();
    roster.sort_unstable();
    roster
}

/// `group-online-users` body: user ids as decimal strings.
pub fn roster_payload(roster: &[i64]) -> serde_json::Value {
    serde_json::Value::Array(
        roster
            .iter()
            .map(|id| serde_json::Value::String(id.to_string()))
            .collect(),
    )
}
