use cohort_db::DbPool;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a connection was refused. The `Display` text doubles as the
/// diagnostic reason sent back to the client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token missing")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("user not found")]
    UserNotFound,
    #[error("profile not found")]
    ProfileNotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
    pub iat: usize,
}

/// Who is on the other end of an authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: i64,
    pub profile_id: i64,
    pub firstname: String,
    pub lastname: String,
}

impl SessionIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}

pub fn create_token(user_id: i64, secret: &str, expiry_secs: u64) -> Result<String, AuthError> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + expiry_secs as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(e.to_string()))
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

/// Verify a bearer credential and resolve it to a user and their profile.
pub async fn authenticate(
    pool: &DbPool,
    token: Option<&str>,
    secret: &str,
) -> Result<SessionIdentity, AuthError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;
    let claims = validate_token(token, secret)?;

    let user = cohort_db::users::find_user_by_id(pool, claims.sub)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .ok_or(AuthError::UserNotFound)?;
    let profile = cohort_db::profiles::find_profile_by_user_id(pool, user.id)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .ok_or(AuthError::ProfileNotFound)?;

    Ok(SessionIdentity {
        user_id: user.id,
        profile_id: profile.id,
        firstname: user.firstname,
        lastname: user.lastname,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{migrated_pool, seed_user};

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trip_keeps_subject() {
        let token = create_token(42, SECRET, 3600).unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap().sub, 42);
        assert!(matches!(
            validate_token(&token, "other-secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_tokens_are_reported_as_expired() {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: 1,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            validate_token(&token, SECRET),
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn authenticate_resolves_user_and_profile() {
        let pool = migrated_pool().await;
        seed_user(&pool, 1, true).await;
        seed_user(&pool, 2, false).await;

        let token = create_token(1, SECRET, 60).unwrap();
        let identity = authenticate(&pool, Some(&token), SECRET).await.unwrap();
        assert_eq!(identity.user_id, 1);
        assert_eq!(identity.profile_id, 1001);
        assert_eq!(identity.full_name(), "User1 Test");

        let no_profile = create_token(2, SECRET, 60).unwrap();
        assert!(matches!(
            authenticate(&pool, Some(&no_profile), SECRET).await,
            Err(AuthError::ProfileNotFound)
        ));

        let ghost = create_token(9, SECRET, 60).unwrap();
        assert!(matches!(
            authenticate(&pool, Some(&ghost), SECRET).await,
            Err(AuthError::UserNotFound)
        ));

        assert!(matches!(
            authenticate(&pool, None, SECRET).await,
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            authenticate(&pool, Some("  "), SECRET).await,
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            authenticate(&pool, Some("garbage"), SECRET).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
