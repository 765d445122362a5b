use crate::auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] AuthError),
    #[error("not a member of this group")]
    NotMember,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("database error: {0}")]
    Database(#[from] cohort_db::DbError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Text safe to hand back to a client. Store and internal failures never
    /// leak detail.
    pub fn client_message(&self) -> String {
        match self {
            Self::Unauthenticated(err) => format!("auth-error: {err}"),
            Self::NotMember => "You are not a member of this group".into(),
            Self::Validation(msg) => msg.clone(),
            Self::RateLimited { .. } => "You're sending messages too fast!".into(),
            Self::Database(_) | Self::Internal(_) => "server error".into(),
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_failures_are_masked() {
        let err = CoreError::Database(cohort_db::DbError::Sqlx(sqlx::Error::PoolClosed));
        assert_eq!(err.client_message(), "server error");
        assert!(err.is_server_error());
        assert_eq!(
            CoreError::Internal("pool closed".into()).client_message(),
            "server error"
        );
    }

    #[test]
    fn client_errors_keep_their_message() {
        assert_eq!(
            CoreError::RateLimited { retry_after_ms: 400 }.client_message(),
            "You're sending messages too fast!"
        );
        assert_eq!(
            CoreError::Validation("groupId missing".into()).client_message(),
            "groupId missing"
        );
        assert_eq!(
            CoreError::Unauthenticated(AuthError::TokenExpired).client_message(),
            "auth-error: token expired"
        );
    }
}
