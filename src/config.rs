use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Credentials for one OAuth provider. A provider with missing credentials is
/// disabled at startup; it never takes the whole process down.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Redis
    pub redis_url: String,

    // Browser origins allowed to start an OAuth flow (one wildcard segment
    // per entry is supported, e.g. "https://*.example.com")
    pub allowed_origins: Vec<String>,

    // Public base URL of this backend, used to build provider redirect URIs
    pub backend_url: String,

    // OAuth providers
    pub google: Option<ProviderCredentials>,
    pub linkedin: Option<ProviderCredentials>,

    // Session tokens
    pub session_signing_key: String,
    pub session_ttl_minutes: i64,

    // Identity provider key set
    pub jwks_url: String,
    pub jwks_cache_ttl_seconds: u64,

    // CSRF state
    pub oauth_state_ttl_seconds: u64,

    // Rate limiting on the OAuth entry points
    pub rate_limit_max_requests: u64,
    pub rate_limit_window_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        // Redis
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string());

        // Allowed browser origins, comma-separated
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let backend_url =
            env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        // OAuth credentials, each provider independently optional
        let google = provider_credentials("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET");
        let linkedin = provider_credentials("LINKEDIN_CLIENT_ID", "LINKEDIN_CLIENT_SECRET");

        // Symmetric session signing key, held only by the backend. Never logged.
        let session_signing_key =
            env::var("SESSION_SIGNING_KEY").context("SESSION_SIGNING_KEY must be set")?;
        let session_ttl_minutes = env::var("SESSION_TTL_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        let jwks_url = env::var("JWKS_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v3/certs".to_string());
        let jwks_cache_ttl_seconds = env::var("JWKS_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1800); // 30 minutes default

        let oauth_state_ttl_seconds = env::var("OAUTH_STATE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(600); // one OAuth round-trip should finish well within this

        let rate_limit_max_requests = env::var("RATE_LIMIT_MAX_REQUESTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let rate_limit_window_seconds = env::var("RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            redis_url,
            allowed_origins,
            backend_url,
            google,
            linkedin,
            session_signing_key,
            session_ttl_minutes,
            jwks_url,
            jwks_cache_ttl_seconds,
            oauth_state_ttl_seconds,
            rate_limit_max_requests,
            rate_limit_window_seconds,
        })
    }
}

fn provider_credentials(id_var: &str, secret_var: &str) -> Option<ProviderCredentials> {
    match (env::var(id_var), env::var(secret_var)) {
        (Ok(client_id), Ok(client_secret))
            if !client_id.is_empty() && !client_secret.is_empty() =>
        {
            Some(ProviderCredentials {
                client_id,
                client_secret,
            })
        }
        _ => None,
    }
}
