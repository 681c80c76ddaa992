//! OIDC Discovery
//!
//! Fetches `{issuer}/.well-known/openid-configuration` and keeps the four
//! endpoints the sign-in flow needs.

use std::time::Duration;

use reqwest::{Client, StatusCode, header::ACCEPT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Timeout for the discovery request
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoints published by an OIDC provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OidcConfiguration {
    /// Issuer identifier
    pub issuer: String,
    /// Authorization endpoint (browser redirect target)
    pub authorization_endpoint: String,
    /// Token endpoint (authorization code exchange)
    pub token_endpoint: String,
    /// Userinfo endpoint
    pub userinfo_endpoint: String,
}

/// Discovery document as served; every field may be absent
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: Option<String>,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    userinfo_endpoint: Option<String>,
}

impl DiscoveryDocument {
    fn into_configuration(self) -> Option<OidcConfiguration> {
        Some(OidcConfiguration {
            issuer: self.issuer?,
            authorization_endpoint: self.authorization_endpoint?,
            token_endpoint: self.token_endpoint?,
            userinfo_endpoint: self.userinfo_endpoint?,
        })
    }
}

/// Retrieve the OIDC configuration for `issuer_url`
///
/// # Errors
///
/// Returns [`Error::Discovery`] if the provider does not answer `200 OK` or
/// the document lacks any of the required endpoints.
pub async fn discover_configuration(http: &Client, issuer_url: &str) -> Result<OidcConfiguration> {
    let url = format!(
        "{}/.well-known/openid-configuration",
        issuer_url.trim_end_matches('/')
    );
    debug!(url = %url, "Discovering OIDC configuration");

    let response = http
        .get(&url)
        .header(ACCEPT, "application/json")
        .timeout(DISCOVERY_TIMEOUT)
        .send()
        .await?;

    if response.status() != StatusCode::OK {
        debug!(status = %response.status(), "OIDC discovery rejected");
        return Err(Error::Discovery(
            "Unable to retrieve OIDC configuration".to_string(),
        ));
    }

    let document: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| Error::Discovery(format!("Unable to parse OIDC configuration: {e}")))?;

    let config = document.into_configuration().ok_or_else(|| {
        Error::Discovery("OIDC configuration missing OAuth endpoints".to_string())
    })?;

    debug!(issuer = %config.issuer, "Discovered OIDC provider");
    Ok(config)
}
