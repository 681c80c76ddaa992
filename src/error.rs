//! Error types for the Q Business API tools

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Q Business API tools
pub type Result<T> = std::result::Result<T, Error>;

/// Raised when a call needs a user id and the client holds no propagated identity.
pub const MSG_MISSING_USER_ID: &str =
    "'user_id' parameter is required, if not using identity propagation credentials.";

/// Raised when only one half of a conversation continuation is supplied.
pub const MSG_MISSING_CONV_SYSMSG_ID: &str =
    "Both conversation ID and previous system message ID are required.";

/// Q Business API tools errors
#[derive(Error, Debug)]
pub enum Error {
    /// Settings could not be loaded or are incomplete
    #[error("Configuration error: {0}")]
    Config(String),

    /// OIDC provider configuration could not be discovered
    #[error("{0}")]
    Discovery(String),

    /// A step of the token exchange returned missing or invalid tokens
    #[error("{0}")]
    Exchange(String),

    /// Inconsistent or missing call parameters
    #[error("{0}")]
    Parameter(String),

    /// Chat controls carry no response scope
    #[error("AI chat response scope setting not found.")]
    ResponseScopeNotFound,

    /// A chat attachment does not exist on local disk
    #[error("Attachment not found: {}", .0.display())]
    AttachmentNotFound(PathBuf),

    /// The remote resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The remote API answered with a non-success status
    #[error("API error {status} ({kind}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Service error type, e.g. `ValidationException`
        kind: String,
        /// Service error message
        message: String,
    },

    /// A response payload did not match the expected schema
    #[error("Unexpected {operation} response: {source}")]
    Schema {
        /// Remote operation whose payload failed to parse
        operation: &'static str,
        /// Underlying deserialization error
        source: serde_json::Error,
    },

    /// Request signing failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// A cloud SDK call failed for a reason this crate does not classify
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Wrap a schema mismatch for `operation`
    pub fn schema(operation: &'static str, source: serde_json::Error) -> Self {
        Self::Schema { operation, source }
    }

    /// Whether this error belongs to the authorization-failure class.
    ///
    /// Discovery and exchange errors abort a sign-in with `403`; everything
    /// else is reported as an internal error.
    #[must_use]
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::Discovery(_) | Self::Exchange(_))
    }
}
