//! Claim shapes shared across the auth pipeline.
//!
//! `IdentityClaims` is what a verified third-party identity normalizes to,
//! regardless of provider. `SessionClaims` is the contract of the backend's
//! own session token; role-gated handlers depend on this shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// Ephemeral identity derived from a verified provider token or userinfo
/// response. Never persisted directly, only used to upsert user/profile rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub provider: &'static str,
}

impl IdentityClaims {
    /// Normalize provider name fields. When given/family name are absent,
    /// falls back to splitting a combined display name on the first
    /// whitespace run.
    pub fn normalize(
        email: String,
        given_name: Option<String>,
        family_name: Option<String>,
        display_name: Option<String>,
        provider: &'static str,
    ) -> Self {
        let mut first_name = given_name.unwrap_or_default();
        let mut last_name = family_name.unwrap_or_default();

        if (first_name.is_empty() || last_name.is_empty()) && display_name.is_some() {
            let name = display_name.unwrap_or_default();
            let (fallback_first, fallback_last) = split_display_name(&name);
            if first_name.is_empty() {
                first_name = fallback_first;
            }
            if last_name.is_empty() {
                last_name = fallback_last;
            }
        }

        Self {
            email,
            first_name,
            last_name,
            provider,
        }
    }
}

/// Split a display name into (first, rest) on the first whitespace run.
/// A single-token name becomes the first name with an empty last name.
pub fn split_display_name(name: &str) -> (String, String) {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return (String::new(), String::new());
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim_start().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Claims carried by the backend's session token. The token is self-contained:
/// no server-side session store is consulted to validate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject email
    pub sub: String,

    /// Stable user identifier, immutable once assigned
    pub user_id: Uuid,

    /// Ordered role set, at minimum ["user"]
    pub roles: Vec<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp), always > iat
    pub exp: i64,
}

impl SessionClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_two_part_name() {
        assert_eq!(
            split_display_name("Ada Lovelace"),
            ("Ada".to_string(), "Lovelace".to_string())
        );
    }

    #[test]
    fn split_single_name() {
        assert_eq!(
            split_display_name("Madonna"),
            ("Madonna".to_string(), String::new())
        );
    }

    #[test]
    fn split_keeps_remaining_tokens_together() {
        assert_eq!(
            split_display_name("Ada King Lovelace"),
            ("Ada".to_string(), "King Lovelace".to_string())
        );
    }

    #[test]
    fn normalize_prefers_explicit_names() {
        let claims = IdentityClaims::normalize(
            "ada@example.com".into(),
            Some("Ada".into()),
            Some("Lovelace".into()),
            Some("Countess of Lovelace".into()),
            "google",
        );
        assert_eq!(claims.first_name, "Ada");
        assert_eq!(claims.last_name, "Lovelace");
    }

    #[test]
    fn normalize_falls_back_to_display_name() {
        let claims = IdentityClaims::normalize(
            "ada@example.com".into(),
            None,
            None,
            Some("Ada Lovelace".into()),
            "google",
        );
        assert_eq!(claims.first_name, "Ada");
        assert_eq!(claims.last_name, "Lovelace");

        let claims = IdentityClaims::normalize(
            "m@example.com".into(),
            None,
            None,
            Some("Madonna".into()),
            "google",
        );
        assert_eq!(claims.first_name, "Madonna");
        assert_eq!(claims.last_name, "");
    }

    #[test]
    fn role_membership() {
        let claims = SessionClaims {
            sub: "ada@example.com".into(),
            user_id: Uuid::new_v4(),
            roles: vec![ROLE_USER.to_string(), ROLE_ADMIN.to_string()],
            iat: 0,
            exp: 60,
        };
        assert!(claims.has_role(ROLE_ADMIN));
        assert!(!claims.has_role("moderator"));
    }
}
