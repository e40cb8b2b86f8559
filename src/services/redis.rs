//! Shared Redis client.
//!
//! Backs the two cross-instance stores the auth core needs: the single-use
//! CSRF state entries and the rate limiter's per-IP timestamp windows.
//! Connection pooling via ConnectionManager.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct RedisService {
    conn: ConnectionManager,
}

impl RedisService {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!("Redis connected");

        Ok(Self { conn })
    }

    /// Clone of the underlying connection for callers that pipeline raw
    /// commands (the rate limiter's atomic window sequence).
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Store a value with a TTL.
    #[instrument(skip(self, value))]
    pub async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();

        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .context("Failed to store value")?;

        debug!(key = key, ttl_secs = ttl.as_secs(), "Stored value");
        Ok(())
    }

    /// Atomically read and delete a key. Returns `None` when the key does not
    /// exist (or was already consumed).
    #[instrument(skip(self))]
    pub async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();

        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("Failed to take value")?;

        debug!(key = key, found = value.is_some(), "Took value");
        Ok(value)
    }

    /// Check if Redis is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}
