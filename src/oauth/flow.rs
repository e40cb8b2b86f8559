//! OAuth authorization-code flow orchestration.
//!
//! Begin validates the caller's origin against the allow-list, binds it into
//! a single-use state value, and hands back the provider's authorization URL.
//! Callback consumes the state (before any token exchange), exchanges the
//! code, extracts a verified identity, upserts the user and profile, and
//! mints a session token. Failures carry only category-level messages for the
//! browser; detail stays in the logs.

use oauth2::{AuthorizationCode, CsrfToken, Scope, TokenResponse};
use serde::Deserialize;

use super::providers::Provider;
use super::state::{mint_state, origin_allowed, origin_of};
use crate::app::AppState;
use crate::auth::IdentityClaims;
use crate::error::{ApiError, ApiResult};

pub struct CallbackSuccess {
    pub session_token: String,
    pub redirect_url: String,
}

/// A callback failure with the best origin we could recover for the error
/// redirect. `origin: None` means the state was unusable and the handler
/// falls back to a generic response.
pub struct CallbackFailure {
    pub origin: Option<String>,
    pub message: &'static str,
}

impl CallbackFailure {
    fn new(origin: Option<&str>, message: &'static str) -> Self {
        Self {
            origin: origin.map(str::to_string),
            message,
        }
    }
}

/// Begin the flow: validate the origin, persist a fresh state value, and
/// build the provider's authorization URL embedding it.
pub async fn begin(app: &AppState, provider: Provider, origin: &str) -> ApiResult<String> {
    if !origin_allowed(origin, &app.settings.allowed_origins) {
        tracing::warn!(origin = origin, "Origin not in allow-list");
        return Err(ApiError::Forbidden("Origin not allowed".to_string()));
    }

    let client = app.providers.client(provider)?;

    let state = mint_state(origin);
    app.states
        .store(&state)
        .await
        .map_err(ApiError::Internal)?;

    let (authorize_url, _csrf) = client
        .authorize_url(|| CsrfToken::new(state.clone()))
        .add_scopes(provider.scopes().iter().map(|s| Scope::new(s.to_string())))
        .url();

    Ok(authorize_url.to_string())
}

/// Complete the flow from the provider redirect.
pub async fn callback(
    app: &AppState,
    provider: Provider,
    state: Option<&str>,
    code: Option<&str>,
) -> Result<CallbackSuccess, CallbackFailure> {
    let Some(state) = state.filter(|s| !s.is_empty()) else {
        tracing::warn!(provider = provider.name(), "Callback missing state");
        return Err(CallbackFailure::new(None, "Invalid authentication state"));
    };

    // Origin for error redirects only; trust requires the store lookup below
    let claimed_origin = error_redirect_origin(state, &app.settings.allowed_origins);

    // Single-use check, always before the token exchange
    match app.states.consume(state).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(provider = provider.name(), "Unknown or replayed state");
            return Err(CallbackFailure::new(
                claimed_origin,
                "Invalid authentication state",
            ));
        }
        Err(e) => {
            tracing::error!(error = %e, "State store unavailable");
            return Err(CallbackFailure::new(claimed_origin, "Authentication failed"));
        }
    }

    let Some(origin) = origin_of(state) else {
        tracing::warn!(provider = provider.name(), "Malformed state value");
        return Err(CallbackFailure::new(None, "Invalid authentication state"));
    };

    let Some(code) = code.filter(|c| !c.is_empty()) else {
        tracing::warn!(provider = provider.name(), "Callback missing code");
        return Err(CallbackFailure::new(Some(origin), "Authentication failed"));
    };

    let identity = match fetch_identity(app, provider, code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(provider = provider.name(), error = %e, "Identity extraction failed");
            return Err(CallbackFailure::new(Some(origin), "Authentication failed"));
        }
    };

    match upsert_and_issue(app, &identity, origin).await {
        Ok(success) => Ok(success),
        Err(e) => {
            tracing::error!(provider = provider.name(), error = %e, "Login processing failed");
            Err(CallbackFailure::new(
                Some(origin),
                "Failed to create account",
            ))
        }
    }
}

/// Origin usable as an error-redirect target before the state has been
/// verified against the store. At that point the embedded origin is whatever
/// the caller put in the query string, so it must independently pass the
/// allow-list or the browser is not redirected at all.
fn error_redirect_origin<'a>(state: &'a str, allowed: &[String]) -> Option<&'a str> {
    origin_of(state).filter(|origin| origin_allowed(origin, allowed))
}

/// Userinfo response shape shared by the OpenID Connect providers
#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Exchange the code and extract normalized identity claims, by the route the
/// provider supports: signed identity token or userinfo fetch.
async fn fetch_identity(
    app: &AppState,
    provider: Provider,
    code: &str,
) -> anyhow::Result<IdentityClaims> {
    let client = app
        .providers
        .client(provider)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let token = client
        .exchange_code(AuthorizationCode::new(code.to_string()))
        .request_async(&app.http_client)
        .await
        .map_err(|e| anyhow::anyhow!("Code exchange failed: {e}"))?;

    if provider.uses_identity_token() {
        let id_token = token
            .extra_fields()
            .id_token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Provider returned no identity token"))?;
        return app.identity.verify(id_token, provider.name()).await;
    }

    let info: UserInfo = app
        .http_client
        .get(provider.userinfo_url())
        .bearer_auth(token.access_token().secret())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Provider returned no email"))?;

    Ok(IdentityClaims::normalize(
        email,
        info.given_name,
        info.family_name,
        info.name,
        provider.name(),
    ))
}

/// Resolve or create the user and profile, then mint the session token.
/// Nothing is written before both state and identity verification succeeded.
async fn upsert_and_issue(
    app: &AppState,
    identity: &IdentityClaims,
    origin: &str,
) -> anyhow::Result<CallbackSuccess> {
    let user = match app.users.find_by_email(&identity.email).await? {
        Some(user) => user,
        None => app.users.create(&identity.email, identity.provider).await?,
    };

    let registered = match app.profiles.find_by_user_id(user.user_id).await? {
        Some(profile) => profile.registered,
        None => {
            app.profiles.create_minimal(user.user_id, identity).await?;
            false
        }
    };

    let session_token = app
        .session_tokens
        .issue(&user.email, &user.roles, user.user_id)?;

    let redirect_url = if registered {
        format!("{}/dashboard?auth=success", origin)
    } else {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("fname", &identity.first_name)
            .append_pair("lname", &identity.last_name)
            .finish();
        format!("{}/auth/complete-registration?{}", origin, query)
    };

    Ok(CallbackSuccess {
        session_token,
        redirect_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_redirect_requires_allow_listed_origin() {
        let allowed = vec!["https://app.example.com".to_string()];

        let ours = mint_state("https://app.example.com");
        assert_eq!(
            error_redirect_origin(&ours, &allowed),
            Some("https://app.example.com")
        );

        // A forged state embedding a foreign origin gets no redirect
        let forged = mint_state("https://evil.test");
        assert_eq!(error_redirect_origin(&forged, &allowed), None);
    }

    #[test]
    fn error_redirect_rejects_malformed_state() {
        let allowed = vec!["https://app.example.com".to_string()];
        assert_eq!(error_redirect_origin("no-separator", &allowed), None);
        assert_eq!(error_redirect_origin("nonce|", &allowed), None);
    }
}
