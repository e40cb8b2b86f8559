//! Unified API error handling
//!
//! Maps the auth error taxonomy onto consistent JSON responses. Browser-facing
//! messages stay category-level; full detail goes to the logs only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// OAuth state missing, mismatched, or already consumed.
    #[error("Invalid authentication state: {0}")]
    CsrfState(String),

    /// Identity or session token failed verification. Always fails closed.
    #[error("Token verification failed: {0}")]
    TokenVerification(String),

    #[error("Too many requests")]
    RateLimited,

    /// Network failure talking to the provider or its key endpoint.
    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Provider not configured: {0}")]
    ProviderDisabled(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::TokenVerification(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::CsrfState(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::ProviderDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::CsrfState(_) => "INVALID_STATE",
            Self::TokenVerification(_) => "INVALID_TOKEN",
            Self::RateLimited => "RATE_LIMITED",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::ProviderDisabled(_) => "PROVIDER_DISABLED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(msg) => msg.clone(),
            Self::Forbidden(msg) => msg.clone(),
            Self::BadRequest(msg) => msg.clone(),
            Self::NotFound(msg) => msg.clone(),
            Self::ProviderDisabled(name) => format!("Provider '{}' is not available", name),
            Self::RateLimited => "Too many requests".to_string(),
            // Category-level only: never surface signature/state/upstream detail
            Self::CsrfState(_) => "Invalid authentication state".to_string(),
            Self::TokenVerification(_) => "Invalid or expired token".to_string(),
            Self::Upstream(_) => "Authentication failed".to_string(),
            Self::Internal(_) | Self::Database(_) => "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            Self::Database(e) => {
                tracing::error!(error = ?e, "Database error");
            }
            Self::Upstream(e) => {
                tracing::error!(error = %e, "Upstream provider error");
            }
            _ => {
                tracing::warn!(error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_429() {
        assert_eq!(ApiError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::RateLimited.error_code(), "RATE_LIMITED");
    }

    #[test]
    fn token_failures_are_401() {
        let err = ApiError::TokenVerification("signature mismatch".into());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused to db host 10.0.0.3"));
        assert_eq!(err.public_message(), "An internal error occurred");

        let err = ApiError::Upstream("tls handshake with accounts.google.com failed".into());
        assert_eq!(err.public_message(), "Authentication failed");
    }
}
