//! Unverified claim extraction from identity tokens
//!
//! Tokens handled here arrive over direct server-to-server calls (the OIDC
//! token endpoint, the federation token exchange), so signatures are NOT
//! checked. Do not feed tokens received from a browser or any other untrusted
//! client through [`decode_unverified`]; verify them against the issuer's JWKS
//! instead.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Decode the payload segment of a compact JWS without verifying it.
///
/// # Errors
///
/// Returns [`Error::Exchange`] if the token is not a three-segment JWT or its
/// payload is not the expected JSON object.
pub fn decode_unverified<T: DeserializeOwned>(token: &str) -> Result<T> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(Error::Exchange("Malformed identity token.".to_string()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::Exchange(format!("Malformed identity token payload: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Exchange(format!("Malformed identity token claims: {e}")))
}
