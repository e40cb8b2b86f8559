pub mod claims;
pub mod identity;
pub mod jwks;
pub mod middleware;
pub mod session;

pub use claims::{IdentityClaims, SessionClaims};
pub use identity::IdentityVerifier;
pub use jwks::KeyCache;
pub use middleware::{RequireAdmin, RequireAuth, SESSION_COOKIE};
pub use session::SessionTokens;
