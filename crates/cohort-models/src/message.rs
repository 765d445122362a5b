use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;

/// Display fields of the user who sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSender {
    #[serde(with = "crate::ids")]
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub profilepic: Option<String>,
}

/// Read-state of a message relative to one viewer. Computed at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadState {
    pub is_read: bool,
    pub fully_read: bool,
    pub read_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(with = "crate::ids")]
    pub id: i64,
    #[serde(with = "crate::ids")]
    pub group_id: i64,
    /// Text body. May be empty when the message only carries attachments.
    pub message: String,
    pub sender: MessageSender,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub read_state: Option<ReadState>,
}

/// One page of group history, oldest message first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Creation time of the oldest message in `messages`; pass it back as
    /// `before` to load the next older page. `None` when the page is empty.
    pub next_cursor: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::AttachmentType;
    use chrono::TimeZone;

    fn sample(read_state: Option<ReadState>) -> Message {
        Message {
            id: 10,
            group_id: 3,
            message: "hello".into(),
            sender: MessageSender {
                id: 1,
                firstname: "Ada".into(),
                lastname: "Lovelace".into(),
                profilepic: None,
            },
            attachments: vec![Attachment {
                id: 11,
                url: "https://cdn.example/notes.pdf".into(),
                attachment_type: AttachmentType::File,
            }],
            created_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            read_state,
        }
    }

    #[test]
    fn live_message_omits_read_state() {
        let value = serde_json::to_value(sample(None)).unwrap();
        assert_eq!(value["groupId"], "3");
        assert_eq!(value["sender"]["firstname"], "Ada");
        assert!(value.get("isRead").is_none());
        assert!(value.get("fullyRead").is_none());
    }

    #[test]
    fn history_message_flattens_read_state() {
        let value = serde_json::to_value(sample(Some(ReadState {
            is_read: true,
            fully_read: false,
            read_count: 1,
        })))
        .unwrap();
        assert_eq!(value["isRead"], true);
        assert_eq!(value["fullyRead"], false);
        assert_eq!(value["readCount"], 1);
    }
}
