use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::ApiError;
use crate::database::schema::{User, Uuid};

use super::permissions::{ActionType, UserRole};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + ttl).timestamp();

        Self {
            user_id: id,
            username,
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Utc::now().timestamp()).is_negative()
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub jti: String,
    pub exp: i64,
}

impl SessionData {
    pub fn from_claims(claims: JwtSessionData, is_admin: bool) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            role: if is_admin {
                UserRole::Admin
            } else {
                UserRole::User
            },
            jti: claims.jti,
            exp: claims.exp,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn authenticate(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.authenticate(self) {
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(ApiError::internal)
}

pub fn generate_jwt_session(user: &User, secret: &str, ttl: Duration) -> Result<String, ApiError> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), ttl);

    claims.sign_with_key(&key).map_err(ApiError::internal)
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, ApiError> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ApiError::InvalidToken)?;

    if session.is_expired() {
        return Err(ApiError::InvalidToken);
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            email: "cook@example.com".into(),
            username: "cook".into(),
            first_name: "Ann".into(),
            last_name: "Cook".into(),
            password: String::new(),
            is_superuser: false,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn round_trip() {
        let token = generate_jwt_session(&user(), "secret", Duration::hours(1)).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = verify_jwt_session(&token, "secret").unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "cook");
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_session(&user(), "secret", Duration::hours(1)).unwrap();
        assert!(matches!(
            verify_jwt_session(&token, "other"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_jwt_session(&user(), "secret", Duration::hours(-1)).unwrap();
        assert!(matches!(
            verify_jwt_session(&token, "secret"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            verify_jwt_session("not.a.token", "secret"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn tokens_are_unique() {
        let a = JwtSessionData::new(1, "a".into(), Duration::hours(1));
        let b = JwtSessionData::new(1, "a".into(), Duration::hours(1));
        assert_ne!(a.jti, b.jti);
    }
}
