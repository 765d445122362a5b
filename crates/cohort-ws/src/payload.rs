use chrono::{DateTime, Utc};
use cohort_core::message::MISSING_FIELDS;
use cohort_models::attachment::NewAttachment;
use cohort_models::ids;
use cohort_util::pagination::HistoryParams;
use serde_json::Value;

pub const GROUP_ID_MISSING: &str = "groupId missing";
pub const INVALID_DATA: &str = "Invalid data";

/// `groupId` either bare or wrapped as `{groupId}`.
pub fn group_id(d: &Value) -> Option<i64> {
    match d {
        Value::Object(map) => map.get("groupId").and_then(ids::from_value),
        other => ids::from_value(other),
    }
}

#[derive(Debug)]
pub struct SendMessageRequest {
    pub group_id: i64,
    pub body: Option<String>,
    pub attachments: Vec<NewAttachment>,
}

pub fn send_message(d: &Value) -> Result<SendMessageRequest, &'static str> {
    let group_id = d
        .get("groupId")
        .and_then(ids::from_value)
        .ok_or(MISSING_FIELDS)?;
    let body = d.get("message").and_then(Value::as_str).map(str::to_string);
    let attachments: Vec<NewAttachment> = match d.get("attachments") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value(raw.clone()).map_err(|_| INVALID_DATA)?,
    };
    if body.is_none() && attachments.is_empty() {
        return Err(MISSING_FIELDS);
    }
    Ok(SendMessageRequest {
        group_id,
        body,
        attachments,
    })
}

/// Both a missing group and a malformed id list are reported as invalid data.
pub fn read_messages(d: &Value) -> Result<(i64, Vec<i64>), &'static str> {
    let group_id = d
        .get("groupId")
        .and_then(ids::from_value)
        .ok_or(INVALID_DATA)?;
    let message_ids = d
        .get("messageIds")
        .and_then(Value::as_array)
        .ok_or(INVALID_DATA)?
        .iter()
        .map(|raw| ids::from_value(raw).ok_or(INVALID_DATA))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((group_id, message_ids))
}

pub fn fetch_messages(d: &Value) -> Result<(i64, HistoryParams), &'static str> {
    let group_id = group_id(d).ok_or(GROUP_ID_MISSING)?;
    let before = match d.get("before") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| INVALID_DATA)?
                .with_timezone(&Utc),
        ),
        Some(_) => return Err(INVALID_DATA),
    };
    let limit = match d.get("limit") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(raw.as_i64().ok_or(INVALID_DATA)?),
    };
    Ok((group_id, HistoryParams { before, limit }))
}
