//! Sliding-window rate limiting for the OAuth entry points.
//!
//! Per-IP request timestamps live in a Redis sorted set so the window is
//! shared across server instances. Each check trims entries older than the
//! window, records the current request, counts what remains, and refreshes
//! the key's expiry, all in one atomic pipeline so concurrent requests from
//! the same IP never undercount.

use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::RedisService;

#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(redis: &RedisService, max_requests: u64, window: Duration) -> Self {
        Self {
            conn: redis.connection(),
            max_requests,
            window,
        }
    }

    /// Admit or reject one request for the given key.
    pub async fn check(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock before Unix epoch")?
            .as_nanos() as i64;
        let window_start = now - self.window.as_nanos() as i64;

        // MULTI/EXEC: trim, insert, count, refresh expiry as one unit
        let (_removed, _added, count, _expire): (i64, i64, u64, i64) = redis::pipe()
            .atomic()
            .zrembyscore(key, 0, window_start)
            .zadd(key, now, now)
            .zcard(key)
            .expire(key, self.window.as_secs() as i64)
            .query_async(&mut conn)
            .await
            .context("Rate limit check failed")?;

        Ok(count <= self.max_requests)
    }
}

/// Axum middleware applying the limiter to a route group, keyed by client IP.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    let key = format!("rate_limit:{}", ip);

    match state.rate_limiter.check(&key).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::warn!(ip = %ip, "Rate limit exceeded");
            ApiError::RateLimited.into_response()
        }
        Err(e) => {
            // Fail closed: a broken limiter store must not open the gate
            tracing::error!(error = %e, "Rate limiter store error");
            ApiError::Internal(e).into_response()
        }
    }
}

fn client_ip(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn forwarded_header_wins() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn connect_info_fallback() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));
        assert_eq!(client_ip(&req), "127.0.0.1");
    }

    #[test]
    fn unknown_when_nothing_available() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }

    // Needs a local Redis at 127.0.0.1:6379; run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn window_admits_then_rejects_then_recovers() {
        let redis = RedisService::new("redis://127.0.0.1:6379").await.unwrap();
        let limiter = RateLimiter::new(&redis, 5, Duration::from_secs(1));
        let key = format!("rate_limit:test:{}", uuid::Uuid::new_v4());

        for _ in 0..5 {
            assert!(limiter.check(&key).await.unwrap());
        }
        assert!(!limiter.check(&key).await.unwrap());

        // All recorded timestamps fall out of the window
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check(&key).await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn windows_are_independent_per_key() {
        let redis = RedisService::new("redis://127.0.0.1:6379").await.unwrap();
        let limiter = RateLimiter::new(&redis, 1, Duration::from_secs(60));
        let first = format!("rate_limit:test:{}", uuid::Uuid::new_v4());
        let second = format!("rate_limit:test:{}", uuid::Uuid::new_v4());

        assert!(limiter.check(&first).await.unwrap());
        assert!(!limiter.check(&first).await.unwrap());
        assert!(limiter.check(&second).await.unwrap());
    }
}
