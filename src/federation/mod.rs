//! Identity federation
//!
//! Turns an OIDC identity token into a security context, and a security
//! context into temporary cloud credentials scoped to the signed-in user.

mod aws;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use aws::AwsIdentityBroker;

use crate::Result;
use crate::random::alphanumeric;

/// Grant type of the identity-token-for-context exchange
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Provider of the context assertion passed to the role assumption
pub const IDENTITY_CENTER_CONTEXT_PROVIDER: &str =
    "arn:aws:iam::aws:contextProvider/IdentityCenter";

/// Claim of the exchanged token that carries the security context
pub const IDENTITY_CONTEXT_CLAIM: &str = "sts:identity_context";

/// Prefix of generated role session names
pub const ROLE_SESSION_PREFIX: &str = "qbusiness-idc-";

/// Raised when the token exchange rejects the identity token grant
pub const MSG_INVALID_GRANT: &str = "CreateTokenWithIAM failed with invalid grant exception. \
    Check if 1/ identity token is reused, 2/ IDC is missing TTI configuration, \
    or 3/ user's primary email in IAM identity center matches the email address of user \
    signing-in via external identity provider.";

/// Raised when the role assumption answers without credentials
pub const MSG_NO_TEMPORARY_CREDENTIAL: &str = "Unable to obtain STS temporary credential.";

/// Opaque security context obtained from an identity token
///
/// Not `Clone`: a context is spent by exactly one role assumption.
pub struct SecurityContext(String);

impl SecurityContext {
    /// Wrap a context assertion
    pub fn new(assertion: impl Into<String>) -> Self {
        Self(assertion.into())
    }

    /// Consume the context, yielding the assertion
    pub fn into_assertion(self) -> String {
        self.0
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurityContext(<redacted>)")
    }
}

/// Temporary credentials bound to the signed-in user's identity
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredential {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token
    pub session_token: String,
    /// Expiry as reported by the issuer. Not enforced or refreshed.
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for TemporaryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Federation calls of the sign-in flow
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// Exchange an OIDC identity token for a security context
    async fn exchange_identity_for_context(
        &self,
        auth_provider_reference: &str,
        id_token: &str,
        region: &str,
    ) -> Result<SecurityContext>;

    /// Assume `role_reference` with the security context, yielding credentials
    async fn assume_role_with_context(
        &self,
        role_reference: &str,
        context: SecurityContext,
        region: &str,
    ) -> Result<TemporaryCredential>;
}

/// Random role session name; collisions are tolerated
pub fn role_session_name() -> String {
    format!("{ROLE_SESSION_PREFIX}{}", alphanumeric(32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_names_have_prefix_and_random_suffix() {
        let name = role_session_name();
        let suffix = name.strip_prefix(ROLE_SESSION_PREFIX).unwrap();
        assert_eq!(suffix.len(), 32);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        // STS limit
        assert!(name.len() <= 64);
    }

    #[test]
    fn credential_debug_hides_secrets() {
        let credential = TemporaryCredential {
            access_key_id: "ASIAEXAMPLE".into(),
            secret_access_key: "very-secret".into(),
            session_token: "session-token".into(),
            expiration: None,
        };
        let debug = format!("{credential:?}");
        assert!(debug.contains("ASIAEXAMPLE"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("session-token"));
    }

    #[test]
    fn context_debug_hides_assertion() {
        let context = SecurityContext::new("ctx-xyz");
        assert!(!format!("{context:?}").contains("ctx-xyz"));
        assert_eq!(context.into_assertion(), "ctx-xyz");
    }

    #[test]
    fn invalid_grant_message_names_three_causes() {
        assert!(MSG_INVALID_GRANT.contains("1/ identity token is reused"));
        assert!(MSG_INVALID_GRANT.contains("2/ IDC is missing TTI configuration"));
        assert!(MSG_INVALID_GRANT.contains("3/ user's primary email"));
    }
}
