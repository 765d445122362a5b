use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttachmentType {
    File,
    Image,
    Video,
    Audio,
}

impl AttachmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "FILE",
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
            Self::Audio => "AUDIO",
        }
    }
}

impl fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAttachmentType(pub String);

impl fmt::Display for UnknownAttachmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown attachment type '{}'", self.0)
    }
}

impl std::error::Error for UnknownAttachmentType {}

impl FromStr for AttachmentType {
    type Err = UnknownAttachmentType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FILE" => Ok(Self::File),
            "IMAGE" => Ok(Self::Image),
            "VIDEO" => Ok(Self::Video),
            "AUDIO" => Ok(Self::Audio),
            _ => Err(UnknownAttachmentType(raw.to_string())),
        }
    }
}

/// A persisted attachment as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(with = "crate::ids")]
    pub id: i64,
    pub url: String,
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
}

/// Attachment metadata supplied by a client alongside a new message. The file
/// itself has already been uploaded elsewhere; only its URL travels here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAttachment {
    pub url: String,
    #[serde(rename = "type")]
    pub attachment_type: String,
}
