mod app;
mod auth;
mod config;
mod db;
mod error;
mod logging;
mod middleware;
mod oauth;
mod routes;
mod services;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::{IdentityVerifier, KeyCache, SessionTokens};
use middleware::RateLimiter;
use oauth::{ProviderRegistry, StateStore};
use services::{ProfileStore, RedisService, UserStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting portal backend"
    );

    // Create database pool and apply pending migrations
    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    // Redis backs the CSRF state store and the rate-limit windows
    let redis = RedisService::new(&settings.redis_url).await?;

    // Shared client for provider calls: bounded timeout, no redirects
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Failed to create HTTP client")?;

    // Provider key cache for identity token verification
    let key_cache = KeyCache::new(settings.jwks_url.clone(), settings.jwks_cache_ttl_seconds);
    if let Err(e) = key_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm key cache - will fetch on first request");
    }

    let rate_limiter = RateLimiter::new(
        &redis,
        settings.rate_limit_max_requests,
        Duration::from_secs(settings.rate_limit_window_seconds),
    );

    let state = Arc::new(app::AppState {
        db: pool.clone(),
        identity: IdentityVerifier::new(key_cache),
        session_tokens: SessionTokens::new(
            &settings.session_signing_key,
            settings.session_ttl_minutes,
        ),
        providers: ProviderRegistry::from_settings(&settings),
        states: StateStore::new(redis.clone(), settings.oauth_state_ttl_seconds),
        rate_limiter,
        users: UserStore::new(pool.clone()),
        profiles: ProfileStore::new(pool),
        redis,
        http_client,
        settings,
    });

    // Build application
    let app = app::create_app(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&state.settings.server_addr).await?;
    tracing::info!("Listening on {}", state.settings.server_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
