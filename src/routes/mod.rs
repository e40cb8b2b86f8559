pub mod admin;
pub mod auth;
pub mod health;
pub mod me;

use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;

use crate::app::AppState;
use crate::middleware::rate_limit::rate_limit;

/// Build the API router with all routes
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // The OAuth entry points sit behind the sliding-window limiter
    let oauth_routes = Router::new()
        .route("/auth/:provider", get(auth::begin))
        .route("/auth/:provider/callback", get(auth::callback))
        .route_layer(axum_middleware::from_fn_with_state(state, rate_limit));

    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/auth/status", get(auth::status))
        .route("/auth/refresh_token", get(auth::refresh_token))
        .route("/auth/logout", get(auth::logout))
        // Protected routes
        .route("/me", get(me::get_me))
        .route("/admin/users", get(admin::list_users))
        .merge(oauth_routes)
}
