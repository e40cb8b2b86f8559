//! Single-use, origin-bound CSRF state.
//!
//! A state value is `{random nonce}|{validated origin}`. It is persisted
//! server-side with a short TTL and consumed atomically at callback time:
//! presenting the same value twice fails, because the first presentation
//! deletes it.

use anyhow::Result;
use regex::Regex;
use std::time::Duration;
use uuid::Uuid;

use crate::services::RedisService;

const STATE_KEY_PREFIX: &str = "oauth:state:";
const STATE_SEPARATOR: char = '|';

/// Build the opaque state value binding a random nonce to the request origin.
pub fn mint_state(origin: &str) -> String {
    format!("{}{}{}", Uuid::new_v4(), STATE_SEPARATOR, origin)
}

/// Recover the origin embedded in a state value. Rejects anything that does
/// not split into exactly a nonce and an origin.
pub fn origin_of(state: &str) -> Option<&str> {
    let (nonce, origin) = state.split_once(STATE_SEPARATOR)?;
    if nonce.is_empty() || origin.is_empty() || origin.contains(STATE_SEPARATOR) {
        return None;
    }
    Some(origin)
}

/// Check an origin against the allow-list. Entries may contain a single
/// wildcard segment, translated glob-to-regex and anchored at both ends.
pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| entry_matches(origin, entry))
}

fn entry_matches(origin: &str, entry: &str) -> bool {
    if !entry.contains('*') {
        return origin == entry;
    }

    let pattern = format!("^{}$", regex::escape(entry).replace("\\*", ".*"));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(origin),
        Err(e) => {
            tracing::warn!(entry = entry, error = %e, "Invalid origin pattern");
            false
        }
    }
}

/// Server-side store for issued state values, shared across instances.
#[derive(Clone)]
pub struct StateStore {
    redis: RedisService,
    ttl: Duration,
}

impl StateStore {
    pub fn new(redis: RedisService, ttl_seconds: u64) -> Self {
        Self {
            redis,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    pub async fn store(&self, state: &str) -> Result<()> {
        self.redis
            .put_with_ttl(&format!("{}{}", STATE_KEY_PREFIX, state), "1", self.ttl)
            .await
    }

    /// Consume a presented state value. Returns `true` iff the exact value
    /// was stored and had not been consumed yet; the entry is deleted either
    /// way before any token exchange happens.
    pub async fn consume(&self, state: &str) -> Result<bool> {
        let value = self
            .redis
            .take(&format!("{}{}", STATE_KEY_PREFIX, state))
            .await?;
        Ok(value.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_embeds_origin() {
        let state = mint_state("https://app.example.com");
        assert_eq!(origin_of(&state), Some("https://app.example.com"));
    }

    #[test]
    fn states_are_unique_per_mint() {
        assert_ne!(mint_state("https://a"), mint_state("https://a"));
    }

    #[test]
    fn malformed_state_has_no_origin() {
        assert_eq!(origin_of("no-separator"), None);
        assert_eq!(origin_of("|https://a"), None);
        assert_eq!(origin_of("nonce|"), None);
        assert_eq!(origin_of("nonce|a|b"), None);
    }

    #[test]
    fn exact_origin_match() {
        let allowed = vec!["http://localhost:3000".to_string()];
        assert!(origin_allowed("http://localhost:3000", &allowed));
        assert!(!origin_allowed("http://localhost:3001", &allowed));
        assert!(!origin_allowed("https://evil.test", &allowed));
    }

    #[test]
    fn wildcard_origin_match() {
        let allowed = vec!["https://*.example.com".to_string()];
        assert!(origin_allowed("https://app.example.com", &allowed));
        assert!(origin_allowed("https://staging.example.com", &allowed));
        assert!(!origin_allowed("https://example.org", &allowed));
        // Anchored both ends: no prefix/suffix smuggling
        assert!(!origin_allowed("https://app.example.com.evil.test", &allowed));
    }

    #[test]
    fn wildcard_does_not_escape_literal_dots() {
        let allowed = vec!["https://*.example.com".to_string()];
        assert!(!origin_allowed("https://appXexampleXcom", &allowed));
    }

    // Needs a local Redis at 127.0.0.1:6379; run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn stored_state_is_consumed_exactly_once() {
        let redis = RedisService::new("redis://127.0.0.1:6379").await.unwrap();
        let store = StateStore::new(redis, 60);
        let state = mint_state("https://app.example.com");

        store.store(&state).await.unwrap();
        assert!(store.consume(&state).await.unwrap());
        // Replayed: the first presentation deleted the entry
        assert!(!store.consume(&state).await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn unknown_state_is_rejected() {
        let redis = RedisService::new("redis://127.0.0.1:6379").await.unwrap();
        let store = StateStore::new(redis, 60);

        assert!(!store.consume(&mint_state("https://app.example.com")).await.unwrap());
    }
}
