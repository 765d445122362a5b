use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ServerEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    /// Room this event is scoped to. `None` reaches every connection.
    pub group_id: Option<i64>,
    /// Connection that must not receive its own event (typing).
    pub exclude_connection: Option<Uuid>,
}

impl ServerEvent {
    /// Whether a connection should see this event, given its room check.
    pub fn is_visible_to(&self, connection_id: Uuid, subscribed: impl FnOnce(i64) -> bool) -> bool {
        if self.exclude_connection == Some(connection_id) {
            return false;
        }
        match self.group_id {
            None => true,
            Some(group_id) => subscribed(group_id),
        }
    }
}

/// Broadcast-based event bus for real-time dispatch. Every gateway session
/// holds one receiver and filters by its own room subscriptions.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: ServerEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to everyone subscribed to `group_id`.
    pub fn dispatch_to_room(&self, event_type: &str, payload: serde_json::Value, group_id: i64) {
        self.publish(ServerEvent {
            event_type: event_type.to_string(),
            payload,
            group_id: Some(group_id),
            exclude_connection: None,
        });
    }

    /// Same as [`dispatch_to_room`](Self::dispatch_to_room) but skips the
    /// originating connection.
    pub fn dispatch_to_room_except(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        group_id: i64,
        connection_id: Uuid,
    ) {
        self.publish(ServerEvent {
            event_type: event_type.to_string(),
            payload,
            group_id: Some(group_id),
            exclude_connection: Some(connection_id),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}
