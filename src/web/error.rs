//! Failure → HTTP response mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use crate::Error;

/// Returned by the callback when the provider sent no code
pub const MSG_MISSING_CODE: &str = "The authorization code was not returned or is not accessible";

/// Returned by the callback when the `state` does not match the sign-in request
pub const MSG_STATE_MISMATCH: &str = "The sign-in request could not be verified";

/// Handler failures
#[derive(Debug)]
pub enum WebError {
    /// No active session
    Unauthorized,
    /// Callback without an authorization code
    MissingCode,
    /// Callback whose `state` does not match the cookie
    StateMismatch,
    /// Sign-in handshake failure
    SignIn(Error),
    /// Failure of a JSON API call made for a signed-in user
    Api(Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Sign-in required").into_response(),
            Self::MissingCode => (StatusCode::FORBIDDEN, MSG_MISSING_CODE).into_response(),
            Self::StateMismatch => (StatusCode::FORBIDDEN, MSG_STATE_MISMATCH).into_response(),
            Self::SignIn(e) if e.is_authorization_failure() => {
                warn!(error = %e, "Sign-in rejected");
                (StatusCode::FORBIDDEN, e.to_string()).into_response()
            }
            Self::SignIn(e) => {
                error!(error = %e, "Sign-in failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
            Self::Api(e @ (Error::Parameter(_) | Error::AttachmentNotFound(_))) => {
                warn!(error = %e, "Rejected request");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
            }
            Self::Api(e) => {
                error!(error = %e, "Q Business call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal error" })),
                )
                    .into_response()
            }
        }
    }
}
