//! Session extraction and role enforcement for protected routes.
//!
//! `RequireAuth` pulls the session token from the request cookie and verifies
//! it; `RequireAdmin` additionally demands the `admin` role. Both reject with
//! `401 Unauthorized` before any handler logic runs.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use super::claims::{SessionClaims, ROLE_ADMIN};
use crate::app::AppState;
use crate::error::ErrorResponse;

/// Name of the session cookie, fixed per deployment
pub const SESSION_COOKIE: &str = "session";

/// Extractor that requires a valid session token
///
/// Example:
/// ```ignore
/// async fn protected_route(auth: RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}", auth.sub)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub SessionClaims);

impl std::ops::Deref for RequireAuth {
    type Target = SessionClaims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extractor that requires a valid session token carrying the admin role
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub SessionClaims);

impl std::ops::Deref for RequireAdmin {
    type Target = SessionClaims;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    MissingRole,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Role failures deliberately look the same as token failures
        let message = match &self {
            AuthError::MissingToken => "Missing session token",
            AuthError::InvalidToken | AuthError::MissingRole => "Unauthorized",
        };

        let body = ErrorResponse {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            request_id: None,
        };

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Verify the session cookie on a request, returning the claims.
pub fn session_from_parts(parts: &Parts, state: &AppState) -> Result<SessionClaims, AuthError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AuthError::MissingToken)?;

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    state.session_tokens.verify(&token).map_err(|e| {
        tracing::warn!(error = %e, "Session token verification failed");
        AuthError::InvalidToken
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = session_from_parts(parts, state)?;
        Ok(RequireAuth(claims))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = session_from_parts(parts, state)?;
        if !claims.has_role(ROLE_ADMIN) {
            return Err(AuthError::MissingRole);
        }
        Ok(RequireAdmin(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_failure_is_401_like_token_failure() {
        let missing_role = AuthError::MissingRole.into_response();
        let invalid = AuthError::InvalidToken.into_response();
        assert_eq!(missing_role.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
    }
}
