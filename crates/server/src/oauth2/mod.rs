//! OAuth2 token issuance.
//!
//! ## Supported Grants
//!
//! - Password (clinic users signing in through a registered client)
//! - Refresh Token (rotated on every use)
//!
//! ## Endpoints
//!
//! - `POST /oauth2/token` - Token endpoint
//! - `POST /oauth2/revoke` - Token revocation
//! - `GET /oauth2/userinfo` - Claims of the presented access token
//! - `GET /.well-known/openid-configuration` - Discovery

pub mod claims;
pub mod endpoints;
pub mod issuer;
pub mod password;
pub mod state;
pub mod stores;

pub use claims::{ClaimsPrincipal, Destination, IdentityClaims};
pub use endpoints::{discovery_router, router};
pub use issuer::{DEFAULT_SCHEME, GrantType, TokenIssuer, TokenRequest, TokenResult};
pub use password::{generate_token, hash_password, verify_password};
pub use state::OAuth2State;
pub use stores::{
    ApplicationStore, AuthenticateResult, AuthenticationContext, ClientApplication,
    DbApplicationStore, DbUserStore, RefreshTokenContext, UserAccount, UserStore,
};

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
