//! Identity provider registry.
//!
//! Providers form a small closed set sharing one contract: exchange an
//! authorization code, then extract a normalized identity. Google asserts
//! identity through a signed ID token; LinkedIn exposes a userinfo endpoint
//! instead. Missing credentials disable a provider at startup without
//! affecting the rest of the process.

use anyhow::{Context, Result};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet, ExtraTokenFields,
    RedirectUrl, StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ProviderCredentials, Settings};
use crate::error::ApiError;

/// Extra token-endpoint fields: OpenID Connect providers return the identity
/// token alongside the access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(default)]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

pub type ProviderTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

// Pin the oauth2 typestate: auth and token endpoints set, nothing else
pub type OAuthClient = Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    LinkedIn,
}

impl Provider {
    pub fn from_path(s: &str) -> Option<Self> {
        match s {
            "google" => Some(Self::Google),
            "linkedin" => Some(Self::LinkedIn),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::LinkedIn => "linkedin",
        }
    }

    /// Whether identity comes from a signed ID token (verified against the
    /// provider key set) or from a userinfo fetch.
    pub const fn uses_identity_token(self) -> bool {
        matches!(self, Self::Google)
    }

    fn authorization_url(self) -> &'static str {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Self::LinkedIn => "https://www.linkedin.com/oauth/v2/authorization",
        }
    }

    fn token_url(self) -> &'static str {
        match self {
            Self::Google => "https://oauth2.googleapis.com/token",
            Self::LinkedIn => "https://www.linkedin.com/oauth/v2/accessToken",
        }
    }

    pub fn userinfo_url(self) -> &'static str {
        match self {
            Self::Google => "https://openidconnect.googleapis.com/v1/userinfo",
            Self::LinkedIn => "https://api.linkedin.com/v2/userinfo",
        }
    }

    pub fn scopes(self) -> &'static [&'static str] {
        match self {
            Self::Google => &["openid", "email", "profile"],
            Self::LinkedIn => &["openid", "email", "profile"],
        }
    }
}

/// Configured OAuth clients, keyed by provider
#[derive(Clone)]
pub struct ProviderRegistry {
    clients: HashMap<Provider, Arc<OAuthClient>>,
}

impl ProviderRegistry {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut clients = HashMap::new();

        let configured = [
            (Provider::Google, settings.google.as_ref()),
            (Provider::LinkedIn, settings.linkedin.as_ref()),
        ];

        for (provider, credentials) in configured {
            match credentials {
                Some(credentials) => {
                    match build_client(provider, credentials, &settings.backend_url) {
                        Ok(client) => {
                            tracing::info!(provider = provider.name(), "OAuth provider enabled");
                            clients.insert(provider, Arc::new(client));
                        }
                        Err(e) => {
                            tracing::error!(
                                provider = provider.name(),
                                error = %e,
                                "Failed to build OAuth client, provider disabled"
                            );
                        }
                    }
                }
                None => {
                    tracing::warn!(
                        provider = provider.name(),
                        "OAuth credentials not configured, provider disabled"
                    );
                }
            }
        }

        Self { clients }
    }

    pub fn client(&self, provider: Provider) -> Result<&Arc<OAuthClient>, ApiError> {
        self.clients
            .get(&provider)
            .ok_or_else(|| ApiError::ProviderDisabled(provider.name().to_string()))
    }
}

fn build_client(
    provider: Provider,
    credentials: &ProviderCredentials,
    backend_url: &str,
) -> Result<OAuthClient> {
    let auth_url = AuthUrl::new(provider.authorization_url().to_string())
        .context("Invalid authorization URL")?;
    let token_url =
        TokenUrl::new(provider.token_url().to_string()).context("Invalid token URL")?;
    let redirect_url = RedirectUrl::new(format!(
        "{}/auth/{}/callback",
        backend_url,
        provider.name()
    ))
    .context("Invalid redirect URL")?;

    Ok(Client::new(ClientId::new(credentials.client_id.clone()))
        .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_path_mapping() {
        assert_eq!(Provider::from_path("google"), Some(Provider::Google));
        assert_eq!(Provider::from_path("linkedin"), Some(Provider::LinkedIn));
        assert_eq!(Provider::from_path("github"), None);
    }

    #[test]
    fn google_uses_identity_token_linkedin_does_not() {
        assert!(Provider::Google.uses_identity_token());
        assert!(!Provider::LinkedIn.uses_identity_token());
    }

    #[test]
    fn build_client_with_valid_credentials() {
        let credentials = ProviderCredentials {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
        };
        assert!(build_client(Provider::Google, &credentials, "http://localhost:8080").is_ok());
    }
}
