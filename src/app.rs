use axum::{http::HeaderValue, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::{IdentityVerifier, SessionTokens};
use crate::config::Settings;
use crate::middleware::{request_id_layer, span_for_request, RateLimiter};
use crate::oauth::{ProviderRegistry, StateStore};
use crate::routes;
use crate::services::{ProfileStore, RedisService, UserStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Settings,
    pub identity: IdentityVerifier,
    pub session_tokens: SessionTokens,
    pub providers: ProviderRegistry,
    pub states: StateStore,
    pub rate_limiter: RateLimiter,
    pub users: UserStore,
    pub profiles: ProfileStore,
    pub redis: RedisService,
    /// Shared HTTP client for provider calls (code exchange, userinfo).
    /// Redirects are disabled and timeouts bounded at construction.
    pub http_client: reqwest::Client,
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);

    // Spans carry the request ID assigned by the outer layer; DEBUG level
    // keeps them out of INFO output
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(span_for_request)
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .merge(routes::api_router(state.clone()))
        // Middleware stack (applied bottom-up)
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    // Wildcard allow-list entries are for OAuth origin checks only; CORS
    // keeps the exact origins
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter(|origin| !origin.contains('*'))
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static("x-request-id"),
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}
