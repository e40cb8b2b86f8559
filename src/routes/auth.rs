//! Authentication routes.
//!
//! `GET /auth/{provider}` and `GET /auth/{provider}/callback` drive the
//! OAuth flow (both sit behind the rate limiter); status, refresh_token and
//! logout operate on the session cookie.

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{HOST, ORIGIN},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::{RequireAuth, SessionTokens, SESSION_COOKIE};
use crate::config::Settings;
use crate::error::{ApiError, ApiResult};
use crate::oauth::{flow, Provider};

#[derive(Serialize)]
pub struct AuthUrlResponse {
    pub url: String,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub authenticated: bool,
}

/// GET /auth/:provider
///
/// Begin the OAuth flow. Requires an allow-listed browser origin; responds
/// with the provider authorization URL for the client to follow.
pub async fn begin(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<AuthUrlResponse>> {
    let provider = parse_provider(&provider)?;
    let origin = request_origin(&headers)
        .ok_or_else(|| ApiError::BadRequest("Cannot determine request origin".to_string()))?;

    let url = flow::begin(&state, provider, &origin).await?;
    Ok(Json(AuthUrlResponse { url }))
}

/// GET /auth/:provider/callback
///
/// Complete the OAuth flow: set the session cookie and redirect the browser
/// back to the origin recovered from the state. Errors redirect to the
/// origin's login page with an opaque, URL-encoded message.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let provider = match parse_provider(&provider) {
        Ok(provider) => provider,
        Err(e) => return e.into_response(),
    };

    match flow::callback(&state, provider, query.state.as_deref(), query.code.as_deref()).await {
        Ok(success) => {
            let jar = jar.add(session_cookie(&state.settings, success.session_token));
            (jar, Redirect::temporary(&success.redirect_url)).into_response()
        }
        Err(failure) => match failure.origin {
            Some(origin) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("error", failure.message)
                    .finish();
                Redirect::temporary(&format!("{}/auth/login?{}", origin, query)).into_response()
            }
            // State unusable: no redirect target to trust, surface a generic
            // failure without internal detail
            None => ApiError::CsrfState(failure.message.to_string()).into_response(),
        },
    }
}

/// GET /auth/status
///
/// 200 with `authenticated: true` for a valid session cookie, 401 with
/// `authenticated: false` when the cookie is missing, expired or forged.
pub async fn status(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (StatusCode, Json<StatusResponse>) {
    let authenticated = session_is_valid(&state.session_tokens, &jar);
    let code = if authenticated {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    (code, Json(StatusResponse { authenticated }))
}

fn session_is_valid(tokens: &SessionTokens, jar: &CookieJar) -> bool {
    jar.get(SESSION_COOKIE)
        .map(|c| tokens.verify(c.value()).is_ok())
        .unwrap_or(false)
}

/// GET /auth/refresh_token
///
/// Re-issue a session token from a still-valid one. The user record is
/// reloaded so revoked accounts or changed roles take effect on refresh.
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .users
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    let token = state
        .session_tokens
        .issue(&user.email, &user.roles, user.user_id)
        .map_err(ApiError::Internal)?;

    let jar = jar.add(session_cookie(&state.settings, token));
    Ok((jar, Json(serde_json::json!({ "message": "Token refreshed" }))))
}

/// GET /auth/logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    let jar = jar.remove(removal);
    (jar, Json(serde_json::json!({ "message": "Successfully logged out" })))
}

fn parse_provider(name: &str) -> ApiResult<Provider> {
    Provider::from_path(name)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown provider: {}", name)))
}

/// Declared `Origin` header, falling back to scheme+host reconstruction.
fn request_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok()) {
        if !origin.is_empty() {
            return Some(origin.to_string());
        }
    }

    let host = headers.get(HOST).and_then(|v| v.to_str().ok())?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    tracing::debug!(host = host, "Origin header missing, reconstructing");
    Some(format!("{}://{}", scheme, host))
}

/// Browser session cookie carrying the session token. The token embeds its
/// own shorter expiry and is re-validated on every request regardless of the
/// cookie lifetime.
fn session_cookie(settings: &Settings, token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(settings.env.is_prod());
    cookie.set_same_site(if settings.env.is_prod() {
        SameSite::Strict
    } else {
        SameSite::Lax
    });
    cookie.set_max_age(time::Duration::days(7));
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    fn settings_with_env(env: Environment) -> Settings {
        Settings {
            env,
            server_addr: "0.0.0.0:8080".into(),
            database_url: "postgres://localhost/test".into(),
            database_max_connections: 1,
            redis_url: "redis://localhost".into(),
            allowed_origins: vec!["http://localhost:3000".into()],
            backend_url: "http://localhost:8080".into(),
            google: None,
            linkedin: None,
            session_signing_key: "k".into(),
            session_ttl_minutes: 15,
            jwks_url: "http://localhost/certs".into(),
            jwks_cache_ttl_seconds: 60,
            oauth_state_ttl_seconds: 600,
            rate_limit_max_requests: 5,
            rate_limit_window_seconds: 60,
        }
    }

    #[test]
    fn origin_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, "https://app.example.com".parse().unwrap());
        headers.insert(HOST, "backend.internal".parse().unwrap());
        assert_eq!(
            request_origin(&headers).as_deref(),
            Some("https://app.example.com")
        );
    }

    #[test]
    fn host_fallback_reconstructs_origin() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "backend.example.com".parse().unwrap());
        assert_eq!(
            request_origin(&headers).as_deref(),
            Some("http://backend.example.com")
        );

        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert_eq!(
            request_origin(&headers).as_deref(),
            Some("https://backend.example.com")
        );
    }

    #[test]
    fn no_origin_or_host_is_none() {
        assert_eq!(request_origin(&HeaderMap::new()), None);
    }

    #[test]
    fn prod_cookie_is_locked_down() {
        let cookie = session_cookie(&settings_with_env(Environment::Prod), "tok".into());
        assert!(cookie.http_only().unwrap_or(false));
        assert!(cookie.secure().unwrap_or(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn status_rejects_missing_and_invalid_sessions() {
        let tokens = SessionTokens::new("test-signing-key", 15);

        assert!(!session_is_valid(&tokens, &CookieJar::new()));

        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-token"));
        assert!(!session_is_valid(&tokens, &jar));

        let token = tokens
            .issue("a@b.se", &["user".to_string()], uuid::Uuid::new_v4())
            .unwrap();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, token));
        assert!(session_is_valid(&tokens, &jar));
    }

    #[test]
    fn dev_cookie_relaxes_secure_and_same_site() {
        let cookie = session_cookie(&settings_with_env(Environment::Dev), "tok".into());
        assert!(cookie.http_only().unwrap_or(false));
        assert!(!cookie.secure().unwrap_or(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
