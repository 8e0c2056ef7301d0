//! HS256 JWT issuance and validation.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cashnote_core::UserId;

/// Issuer written into (and required from) every token.
pub const TOKEN_ISSUER: &str = "cashnote-api";

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: UserId,

    /// Credential id (email) the token was issued for.
    pub email: String,

    pub full_name: String,

    pub iss: String,

    /// Issued-at, not-before and expiry as unix seconds.
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token")]
    Invalid,
}

/// Issues and validates HS256 tokens with a shared secret.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Returns the signed token and its lifetime in seconds.
    pub fn issue_access_token(
        &self,
        user_id: UserId,
        email: &str,
        full_name: &str,
    ) -> Result<(String, i64), TokenError> {
        self.issue(user_id, email, full_name, self.access_ttl)
    }

    pub fn issue_refresh_token(
        &self,
        user_id: UserId,
        email: &str,
        full_name: &str,
    ) -> Result<(String, i64), TokenError> {
        self.issue(user_id, email, full_name, self.refresh_ttl)
    }

    fn issue(
        &self,
        user_id: UserId,
        email: &str,
        full_name: &str,
        ttl: Duration,
    ) -> Result<(String, i64), TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            full_name: full_name.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Invalid)?;
        Ok((token, ttl.num_seconds()))
    }

    /// Verify signature, expiry and issuer.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

impl core::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtManager")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(secret: &str) -> JwtManager {
        JwtManager::new(secret, Duration::minutes(15), Duration::days(7))
    }

    #[test]
    fn issued_access_token_validates() {
        let jwt = manager("test-secret");
        let user_id = UserId::new();
        let (token, expires_in) = jwt
            .issue_access_token(user_id, "budi@example.com", "Budi")
            .unwrap();
        assert_eq!(expires_in, 15 * 60);

        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "budi@example.com");
        assert_eq!(claims.iss, TOKEN_ISSUER);
    }

    #[test]
    fn refresh_token_lives_longer_than_access_token() {
        let jwt = manager("test-secret");
        let user_id = UserId::new();
        let (_, access) = jwt
            .issue_access_token(user_id, "a@example.com", "A")
            .unwrap();
        let (_, refresh) = jwt
            .issue_refresh_token(user_id, "a@example.com", "A")
            .unwrap();
        assert!(refresh > access);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let jwt = JwtManager::new("test-secret", Duration::seconds(-120), Duration::days(7));
        let (token, _) = jwt
            .issue_access_token(UserId::new(), "late@example.com", "Late")
            .unwrap();
        assert_eq!(jwt.validate(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn token_signed_with_another_secret_is_invalid() {
        let (token, _) = manager("secret-a")
            .issue_access_token(UserId::new(), "x@example.com", "X")
            .unwrap();
        assert_eq!(
            manager("secret-b").validate(&token).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(
            manager("test-secret").validate("not.a.token").unwrap_err(),
            TokenError::Invalid
        );
    }
}
