//! Random identifiers
//!
//! None of these values protect anything on their own: client tokens and role
//! session names only need to be unique enough, and collisions are tolerated.
//! The session cookie value is the exception and uses 256 bits of entropy.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngExt;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Random ASCII letters and digits of length `len`
pub fn alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let byte: u8 = rng.random();
            char::from(ALPHANUMERIC[usize::from(byte) % ALPHANUMERIC.len()])
        })
        .collect()
}

/// Idempotency token for mutating Q Business calls
pub fn client_token() -> String {
    alphanumeric(32)
}

/// Opaque session cookie value (`qbs_<43-char URL-safe base64>`)
pub fn session_token() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    format!("qbs_{}", URL_SAFE_NO_PAD.encode(random_bytes))
}
