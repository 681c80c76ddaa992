//! OIDC sign-in support
//!
//! Provider discovery, the authorization code exchange, userinfo retrieval and
//! unverified claim extraction for identity tokens received server-to-server.

pub mod claims;
pub mod discovery;
pub mod exchange;

pub use claims::decode_unverified;
pub use discovery::{OidcConfiguration, discover_configuration};
pub use exchange::{
    OidcIdentity, UserInfo, authorization_url, exchange_code_for_identity, fetch_user_info,
};
