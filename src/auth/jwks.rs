//! Cache for the identity provider's published signing keys.
//!
//! Keys are fetched lazily from the provider's JWKS endpoint and re-fetched
//! when a token references an unknown key identifier. A miss after a refresh
//! is an error: callers must treat it as "cannot verify" and fail closed.

use anyhow::{Context, Result};
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// JWKS response structure
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

/// Individual JWK entry: modulus and exponent are base64url big integers
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    cached_at: Instant,
}

/// Process-local cache of the provider's public key set
#[derive(Clone)]
pub struct KeyCache {
    inner: Arc<RwLock<KeyCacheInner>>,
    jwks_url: String,
    ttl: Duration,
}

struct KeyCacheInner {
    keys: HashMap<String, CachedKey>,
    last_fetch: Option<Instant>,
}

impl KeyCache {
    pub fn new(jwks_url: String, ttl_seconds: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(KeyCacheInner {
                keys: HashMap::new(),
                last_fetch: None,
            })),
            jwks_url,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Resolve the public key for a key identifier, fetching the provider's
    /// key set on a miss or when the cached entry has aged out.
    pub async fn get_key(&self, kid: &str) -> Result<DecodingKey> {
        {
            let cache = self.inner.read();
            if let Some(cached) = cache.keys.get(kid) {
                if cached.cached_at.elapsed() < self.ttl {
                    return Ok(cached.key.clone());
                }
            }
        }

        self.refresh_keys().await?;

        let cache = self.inner.read();
        cache
            .keys
            .get(kid)
            .map(|c| c.key.clone())
            .context("Key not found in provider key set")
    }

    async fn refresh_keys(&self) -> Result<()> {
        {
            let cache = self.inner.read();
            if let Some(last) = cache.last_fetch {
                // Bound concurrent miss storms: at most one fetch per second,
                // later callers accept the just-populated set
                if last.elapsed() < Duration::from_secs(1) {
                    return Ok(());
                }
            }
        }

        tracing::debug!("Fetching provider key set from {}", self.jwks_url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .get(&self.jwks_url)
            .send()
            .await
            .context("Failed to fetch provider key set")?;

        if !response.status().is_success() {
            anyhow::bail!("Key set fetch failed with status: {}", response.status());
        }

        let jwks: JwksResponse = response
            .json()
            .await
            .context("Failed to parse provider key set")?;

        let mut cache = self.inner.write();
        cache.last_fetch = Some(Instant::now());

        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    cache.keys.insert(
                        jwk.kid.clone(),
                        CachedKey {
                            key,
                            cached_at: Instant::now(),
                        },
                    );
                    tracing::debug!("Cached provider key: {}", jwk.kid);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse provider key {}: {}", jwk.kid, e);
                }
            }
        }

        tracing::info!("Key cache refreshed with {} keys", cache.keys.len());
        Ok(())
    }

    /// Pre-warm the cache by fetching keys
    pub async fn warm_cache(&self) -> Result<()> {
        self.refresh_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error_not_a_key() {
        // Port 1 is refused immediately; the cache must surface the failure
        let cache = KeyCache::new("http://127.0.0.1:1/certs".to_string(), 60);
        assert!(cache.get_key("any-kid").await.is_err());
    }
}
