//! Issuance and verification of the backend's own session token.
//!
//! A compact HS256 token carrying [`SessionClaims`]. The signing key is
//! symmetric, process-wide, and read-only after startup. Verification is a
//! pure stateless check: signature plus expiry, nothing server-side.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::claims::SessionClaims;

#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl SessionTokens {
    pub fn new(signing_key: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_key.as_bytes()),
            ttl_minutes,
        }
    }

    /// Mint a signed session token with `exp = now + ttl`.
    pub fn issue(&self, email: &str, roles: &[String], user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: email.to_string(),
            user_id,
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.ttl_minutes)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to sign session token")
    }

    /// Verify signature and expiry, returning the claims. Fails on expired,
    /// tampered, or malformed tokens.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .context("Session token validation failed")?;
        Ok(data.claims)
    }

    /// Re-issue a token for the same subject with a fresh expiry. The
    /// presented token must still verify; this is a convenience re-issue,
    /// not a separate long-lived refresh credential.
    pub fn refresh(&self, token: &str) -> Result<String> {
        let claims = self.verify(token)?;
        self.issue(&claims.sub, &claims.roles, claims.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::{ROLE_ADMIN, ROLE_USER};

    const KEY: &str = "test-signing-key-please-rotate";

    fn roles() -> Vec<String> {
        vec![ROLE_USER.to_string(), ROLE_ADMIN.to_string()]
    }

    #[test]
    fn issue_verify_round_trip() {
        let tokens = SessionTokens::new(KEY, 15);
        let user_id = Uuid::new_v4();

        let token = tokens.issue("ada@example.com", &roles(), user_id).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.sub, "ada@example.com");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.roles, roles());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_key_always_fails() {
        let tokens = SessionTokens::new(KEY, 15);
        let other = SessionTokens::new("a-different-key", 15);

        let token = tokens
            .issue("ada@example.com", &roles(), Uuid::new_v4())
            .unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn expired_token_fails() {
        let tokens = SessionTokens::new(KEY, 15);

        // A 15-minute token presented 16 minutes later: encode claims whose
        // expiry is already in the past with the same key
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "ada@example.com".into(),
            user_id: Uuid::new_v4(),
            roles: roles(),
            iat: (now - Duration::minutes(31)).timestamp(),
            exp: (now - Duration::minutes(16)).timestamp(),
        };
        let stale = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(KEY.as_bytes()),
        )
        .unwrap();

        assert!(tokens.verify(&stale).is_err());
    }

    #[test]
    fn tampered_token_fails() {
        let tokens = SessionTokens::new(KEY, 15);
        let token = tokens
            .issue("ada@example.com", &roles(), Uuid::new_v4())
            .unwrap();

        let mut tampered = token.clone();
        tampered.truncate(token.len() - 2);
        assert!(tokens.verify(&tampered).is_err());
        assert!(tokens.verify("garbage").is_err());
    }

    #[test]
    fn refresh_preserves_subject_and_roles() {
        let tokens = SessionTokens::new(KEY, 15);
        let user_id = Uuid::new_v4();

        let token = tokens.issue("ada@example.com", &roles(), user_id).unwrap();
        let refreshed = tokens.refresh(&token).unwrap();
        let claims = tokens.verify(&refreshed).unwrap();

        assert_eq!(claims.sub, "ada@example.com");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.roles, roles());
    }

    #[test]
    fn refresh_rejects_invalid_token() {
        let tokens = SessionTokens::new(KEY, 15);
        assert!(tokens.refresh("not-a-token").is_err());
    }
}
