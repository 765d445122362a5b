use cohort_core::auth::SessionIdentity;
use cohort_core::events::ServerEvent;
use cohort_core::rooms::RoomRegistry;
use uuid::Uuid;

pub struct Session {
    pub connection_id: Uuid,
    pub identity: SessionIdentity,
    pub sequence: u64,
}

impl Session {
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            identity,
            sequence: 0,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.identity.user_id
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Room events only reach connections subscribed to that room.
    pub fn should_receive_event(&self, event: &ServerEvent, rooms: &RoomRegistry) -> bool {
        event.is_visible_to(self.connection_id, |group_id| {
            rooms.is_subscribed(self.connection_id, group_id)
        })
    }
}
