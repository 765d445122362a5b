use cohort_models::attachment::{AttachmentType, NewAttachment};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("value is too long (max {max}, got {got})")]
    TooLong { max: usize, got: usize },
    #[error("too many attachments (max {max}, got {got})")]
    TooManyAttachments { max: usize, got: usize },
    #[error("message has no content")]
    Empty,
    #[error("attachment url is missing")]
    MissingUrl,
    #[error("unknown attachment type '{0}'")]
    UnknownAttachmentType(String),
}

/// A message must carry text or at least one attachment.
pub fn validate_message_content(
    body: &str,
    attachment_count: usize,
    max_len: usize,
) -> Result<(), ValidationError> {
    let len = body.chars().count();
    if len > max_len {
        return Err(ValidationError::TooLong { max: max_len, got: len });
    }
    if body.trim().is_empty() && attachment_count == 0 {
        return Err(ValidationError::Empty);
    }
    Ok(())
}

/// Check attachment metadata and resolve each declared type.
pub fn validate_attachments(
    attachments: &[NewAttachment],
    max: usize,
) -> Result<Vec<(String, AttachmentType)>, ValidationError> {
    if attachments.len() > max {
        return Err(ValidationError::TooManyAttachments {
            max,
            got: attachments.len(),
        });
    }
    attachments
        .iter()
        .map(|att| {
            let url = att.url.trim();
            if url.is_empty() {
                return Err(ValidationError::MissingUrl);
            }
            let kind = att
                .attachment_type
                .parse::<AttachmentType>()
                .map_err(|e| ValidationError::UnknownAttachmentType(e.0))?;
            Ok((url.to_string(), kind))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn att(url: &str, kind: &str) -> NewAttachment {
        NewAttachment {
            url: url.into(),
            attachment_type: kind.into(),
        }
    }

    #[test]
    fn empty_body_needs_attachments() {
        assert_eq!(validate_message_content("  ", 0, 10), Err(ValidationError::Empty));
        assert!(validate_message_content("", 1, 10).is_ok());
        assert!(validate_message_content("hi", 0, 10).is_ok());
    }

    #[test]
    fn body_length_is_counted_in_chars() {
        assert!(validate_message_content("ééé", 0, 3).is_ok());
        assert_eq!(
            validate_message_content("abcd", 0, 3),
            Err(ValidationError::TooLong { max: 3, got: 4 })
        );
    }

    #[test]
    fn attachments_resolve_types() {
        let resolved =
            validate_attachments(&[att(" https://x/a.png ", "image"), att("https://x/b", "FILE")], 4)
                .unwrap();
        assert_eq!(resolved[0], ("https://x/a.png".to_string(), AttachmentType::Image));
        assert_eq!(resolved[1].1, AttachmentType::File);
    }

    #[test]
    fn attachments_reject_bad_entries() {
        assert_eq!(
            validate_attachments(&[att("", "IMAGE")], 4),
            Err(ValidationError::MissingUrl)
        );
        assert_eq!(
            validate_attachments(&[att("https://x", "gif")], 4),
            Err(ValidationError::UnknownAttachmentType("gif".into()))
        );
        assert_eq!(
            validate_attachments(&[att("a", "FILE"), att("b", "FILE")], 1),
            Err(ValidationError::TooManyAttachments { max: 1, got: 2 })
        );
    }
}
