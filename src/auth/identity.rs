//! Verification of provider-issued identity tokens.
//!
//! The token's header names the signing key; the key is resolved through the
//! [`KeyCache`], the signature and temporal claims are checked, and the
//! standard profile claims are normalized into [`IdentityClaims`]. Any
//! failure (unknown key, bad signature, expired, missing email) rejects the
//! token; unsigned or algorithm-"none" tokens never pass.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;

use super::claims::IdentityClaims;
use super::jwks::KeyCache;

/// Raw claims of an OpenID Connect identity token
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[allow(dead_code)]
    exp: i64,
}

#[derive(Clone)]
pub struct IdentityVerifier {
    keys: KeyCache,
}

impl IdentityVerifier {
    pub fn new(keys: KeyCache) -> Self {
        Self { keys }
    }

    /// Verify an identity token and extract normalized claims.
    pub async fn verify(&self, token: &str, provider: &'static str) -> Result<IdentityClaims> {
        let header = decode_header(token).context("Invalid identity token header")?;
        if header.alg != Algorithm::RS256 {
            anyhow::bail!("Unsupported identity token algorithm: {:?}", header.alg);
        }
        let kid = header.kid.context("Identity token missing kid header")?;

        let decoding_key = self.keys.get_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // Audience is enforced by the provider-side code exchange, not here
        validation.validate_aud = false;

        let token_data = decode::<IdTokenClaims>(token, &decoding_key, &validation)
            .context("Identity token validation failed")?;
        let raw = token_data.claims;

        let email = raw
            .email
            .filter(|e| !e.is_empty())
            .context("Identity token has no email claim")?;

        Ok(IdentityClaims::normalize(
            email,
            raw.given_name,
            raw.family_name,
            raw.name,
            provider,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier_with_unreachable_jwks() -> IdentityVerifier {
        IdentityVerifier::new(KeyCache::new("http://127.0.0.1:1/certs".to_string(), 60))
    }

    // header {"alg":"none","typ":"JWT"}, unsigned
    const NONE_ALG_TOKEN: &str =
        "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJlbWFpbCI6ImFAYi5zZSIsImV4cCI6NDEwMjQ0NDgwMH0.";

    // header {"alg":"RS256","typ":"JWT","kid":"absent-key"}
    const UNKNOWN_KID_TOKEN: &str =
        "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCIsImtpZCI6ImFic2VudC1rZXkifQ.eyJlbWFpbCI6ImFAYi5zZSIsImV4cCI6NDEwMjQ0NDgwMH0.sig";

    #[tokio::test]
    async fn rejects_alg_none_token() {
        let verifier = verifier_with_unreachable_jwks();
        assert!(verifier.verify(NONE_ALG_TOKEN, "google").await.is_err());
    }

    #[tokio::test]
    async fn rejects_token_with_unknown_key_id() {
        // No fallback acceptance when the key id cannot be resolved
        let verifier = verifier_with_unreachable_jwks();
        assert!(verifier.verify(UNKNOWN_KID_TOKEN, "google").await.is_err());
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let verifier = verifier_with_unreachable_jwks();
        assert!(verifier.verify("not-a-jwt", "google").await.is_err());
    }
}
