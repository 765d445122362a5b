use serde::{Deserialize, Serialize};

// Client -> Server opcodes
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_ACTION: u8 = 2;

// Server -> Client opcodes
pub const OP_DISPATCH: u8 = 0;
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;
pub const OP_ACK: u8 = 12;

/// Raw frame as received from a client. Actions carry an event name in `t`,
/// a payload in `d` and an optional `ack` id the reply is correlated with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

// Client actions
pub const ACTION_JOIN_GROUP: &str = "join-group";
pub const ACTION_LEAVE_GROUP: &str = "leave-group";
pub const ACTION_SEND_MESSAGE: &str = "send-message";
pub const ACTION_TYPING: &str = "typing";
pub const ACTION_READ_MESSAGES: &str = "read-messages";
pub const ACTION_FETCH_MESSAGES: &str = "fetch-messages";

// Room dispatch events
pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_GROUP_ONLINE_USERS: &str = "group-online-users";
pub const EVENT_MESSAGES_READ: &str = "messages-read";
pub const EVENT_USER_TYPING: &str = "user-typing";

/// Reply to an acknowledged action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckPayload {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl AckPayload {
    pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }
}

/// `messages-read` broadcast body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesRead {
    #[serde(with = "crate::ids")]
    pub user_id: i64,
    #[serde(with = "crate::ids::vec")]
    pub message_ids: Vec<i64>,
}

/// `user-typing` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    #[serde(with = "crate::ids")]
    pub user_id: i64,
    pub fullname: String,
}
